//! `META-INF/container.xml` lookup.

use crate::error::{Error, Result};
use crate::path;
use crate::xml::Document;

/// Location of the container document inside every package.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Media type of an OPF package document.
pub const OEBPS_PACKAGE_TYPE: &str = "application/oebps-package+xml";

/// A `rootfile` entry pointing at a package document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rootfile {
    /// Package path of the OPF file, normalized.
    pub full_path: String,
    pub media_type: String,
}

/// Find the first OEBPS rendition declared in a container document.
///
/// Returns `Ok(None)` when no `rootfile` has both the package media type and
/// a `full-path`.
pub fn read(bytes: &[u8]) -> Result<Option<Rootfile>> {
    let doc = Document::parse(bytes).map_err(|e| Error::parse(CONTAINER_PATH, e))?;

    let rootfile = doc
        .elements()
        .into_iter()
        .filter(|e| e.local_name() == "rootfile")
        .find_map(|e| {
            let media_type = e.attr("media-type")?;
            if media_type != OEBPS_PACKAGE_TYPE {
                return None;
            }
            let full_path = e.attr("full-path")?;
            Some(Rootfile {
                full_path: path::normalize(&full_path),
                media_type: media_type.into_owned(),
            })
        });

    Ok(rootfile)
}
