//! Extracting a packaged EPUB onto disk.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::info;
use zip::ZipArchive;

use crate::error::Result;

/// An extracted package on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRoot {
    pub path: PathBuf,
    /// Number of archive entries written below `path`.
    pub entries: usize,
}

/// Something that can turn an archive into a directory tree.
pub trait ArchiveSource {
    fn extract(&self, archive: &Path) -> Result<PackageRoot>;
}

/// Extracts ZIP archives into a working directory that is recreated on
/// every run.
#[derive(Debug, Clone)]
pub struct ZipExtractor {
    work_dir: PathBuf,
}

impl ZipExtractor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        ZipExtractor {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

impl ArchiveSource for ZipExtractor {
    fn extract(&self, archive: &Path) -> Result<PackageRoot> {
        // The previous extraction is only removed once the archive opens.
        let mut zip = ZipArchive::new(File::open(archive)?)?;

        if self.work_dir.exists() {
            fs::remove_dir_all(&self.work_dir)?;
        }
        fs::create_dir_all(&self.work_dir)?;

        // Entries whose names would escape the directory are rejected here.
        zip.extract(&self.work_dir)?;

        let entries = zip.len();
        info!(
            "Extracted {entries} entries into {} directory",
            self.work_dir.display()
        );

        Ok(PackageRoot {
            path: self.work_dir.clone(),
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_recreates_work_dir() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("book.epub");
        write_zip(
            &archive,
            &[
                ("mimetype", "application/epub+zip"),
                ("META-INF/container.xml", "<container/>"),
            ],
        );

        let work_dir = temp.path().join("extracted");
        fs::create_dir_all(&work_dir).unwrap();
        fs::write(work_dir.join("stale.txt"), "left over").unwrap();

        let root = ZipExtractor::new(&work_dir).extract(&archive).unwrap();
        assert_eq!(root.path, work_dir);
        assert_eq!(root.entries, 2);
        assert!(!work_dir.join("stale.txt").exists());
        assert_eq!(
            fs::read_to_string(work_dir.join("META-INF").join("container.xml")).unwrap(),
            "<container/>"
        );
    }

    #[test]
    fn test_extract_missing_archive() {
        let temp = TempDir::new().unwrap();
        let work_dir = temp.path().join("extracted");
        fs::create_dir_all(&work_dir).unwrap();
        fs::write(work_dir.join("keep.txt"), "previous run").unwrap();

        let result = ZipExtractor::new(&work_dir).extract(&temp.path().join("missing.epub"));
        assert!(result.is_err());
        assert!(work_dir.join("keep.txt").exists());
    }

    #[test]
    fn test_extract_not_a_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("book.epub");
        fs::write(&archive, "definitely not a zip").unwrap();

        let result = ZipExtractor::new(temp.path().join("extracted")).extract(&archive);
        assert!(matches!(result, Err(crate::Error::Zip(_))));
    }
}
