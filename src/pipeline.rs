//! The conversion pipeline: container → package document → Navigation
//! Document, run once over an extracted package.
//!
//! Each stage reads its document from disk, works on it in memory and writes
//! it back only after all of its checks passed. Nothing is shared between
//! stages except the values one hands to the next.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::{ArchiveSource, ZipExtractor};
use crate::container::{self, CONTAINER_PATH, Rootfile};
use crate::error::{Error, Result};
use crate::nav::{self, RewriteReport};
use crate::package::{PackageDocument, Relocation};
use crate::path;
use crate::xml::Document;

/// Settings for a conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory the archive is extracted into. Wiped at the start of a run.
    pub work_dir: PathBuf,
    /// Name of the WebBook entry point, placed at the package root.
    pub nav_file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            work_dir: PathBuf::from("extracted"),
            nav_file_name: "index.xhtml".to_string(),
        }
    }
}

/// How a run ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The container declares no OEBPS package; nothing was done.
    NoRendition,
    /// The Navigation Document is already the entry point; nothing was done.
    AlreadyWebBook { nav: String },
    /// The Navigation Document was relocated and the package updated.
    Converted(Conversion),
}

/// Details of a successful relocation. Paths are package paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// The OPF file that was updated.
    pub package: String,
    /// Where the Navigation Document was read from (left in place).
    pub from: String,
    /// Where the rewritten Navigation Document was written.
    pub to: String,
    /// The navigation item's new href.
    pub href: String,
    pub report: RewriteReport,
}

/// Runs the stages over one extracted package.
#[derive(Debug, Clone)]
pub struct Pipeline {
    root: PathBuf,
    target: String,
}

impl Pipeline {
    /// A pipeline over `root` using the default entry point name.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, &Config::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        Pipeline {
            root: root.into(),
            target: path::normalize(&config.nav_file_name),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run every stage in order.
    pub fn run(&self) -> Result<Outcome> {
        check_entry_point(&self.target)?;
        let Some(rootfile) = self.find_rendition()? else {
            return Ok(Outcome::NoRendition);
        };
        self.process_package(&rootfile)
    }

    /// Stage 1: locate the package document.
    fn find_rendition(&self) -> Result<Option<Rootfile>> {
        let container_path = path::to_fs_path(&self.root, CONTAINER_PATH);
        let bytes = match fs::read(&container_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("No {CONTAINER_PATH} in package, nothing to do");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        info!("Found container.xml: {}", container_path.display());

        let rootfile = container::read(&bytes)?;
        if rootfile.is_none() {
            debug!("container.xml declares no OEBPS package document");
        }
        Ok(rootfile)
    }

    /// Stage 2: validate the package document and relocate its Navigation
    /// Document.
    fn process_package(&self, rootfile: &Rootfile) -> Result<Outcome> {
        let opf_path = path::to_fs_path(&self.root, &rootfile.full_path);
        let bytes = fs::read(&opf_path)?;
        info!("Found main rendition: {}", rootfile.full_path);

        let mut package = PackageDocument::parse(&rootfile.full_path, &bytes)?;
        let version = package.version()?;
        debug!("EPUB version {}", version.as_str());

        let item = package.nav_item()?;
        info!("Found navigation item in OPF: {}", item.href);

        let (from, to, href) = match package.plan(&item, &self.target)? {
            Relocation::AlreadyInPlace { location } => {
                warn!(
                    "Nothing to do, package already has a {location} file in topmost directory"
                );
                return Ok(Outcome::AlreadyWebBook { nav: location });
            }
            Relocation::Move { from, to, href } => (from, to, href),
        };

        let report = self.rewrite_navigation(&from, &to)?;

        info!("Changing navigation item to target file {href}");
        package.set_nav_href(&href)?;
        fs::write(&opf_path, package.to_xml())?;
        info!("Package document modified and saved.");

        Ok(Outcome::Converted(Conversion {
            package: package.path().to_string(),
            from,
            to,
            href,
            report,
        }))
    }

    /// Stage 3: rewrite the Navigation Document into its new location.
    fn rewrite_navigation(&self, from: &str, to: &str) -> Result<RewriteReport> {
        info!("Reading Navigation Document: {from}");
        let bytes = fs::read(path::to_fs_path(&self.root, from))?;
        let mut doc = Document::parse(&bytes).map_err(|e| Error::parse(from, e))?;

        info!("Fixing hyperlinks in Navigation Document");
        let report = nav::rewrite(&mut doc, from, to)?;
        debug!(
            "{} references rewritten, {} left untouched",
            report.rewritten, report.untouched
        );

        let target = path::to_fs_path(&self.root, to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, doc.to_xml())?;
        info!("Navigation Document modified and saved.");

        Ok(report)
    }
}

/// The entry point must name a file inside the package.
fn check_entry_point(target: &str) -> Result<()> {
    if target.is_empty() || path::escapes_root(target) {
        return Err(Error::InvalidEpub(format!(
            "entry point {target:?} does not name a file inside the package"
        )));
    }
    Ok(())
}

/// Extract `archive` into `config.work_dir` and convert it.
pub fn convert(archive: &Path, config: &Config) -> Result<Outcome> {
    convert_with(&ZipExtractor::new(&config.work_dir), archive, config)
}

/// Like [`convert`], with a caller-supplied archive source.
pub fn convert_with<S: ArchiveSource + ?Sized>(
    source: &S,
    archive: &Path,
    config: &Config,
) -> Result<Outcome> {
    check_entry_point(&path::normalize(&config.nav_file_name))?;
    let root = source.extract(archive)?;
    Pipeline::with_config(root.path, config).run()
}
