//! OPF package document handling.
//!
//! Checks that the package is EPUB 3.0/3.1, finds the manifest item that
//! declares the Navigation Document, and decides where that document has to
//! move so the package can be served as a WebBook.

use crate::error::{Error, Result};
use crate::path;
use crate::xml::{Document, Element};

/// Media type a Navigation Document must declare.
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";

/// EPUB version of a package document this crate can process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpubVersion {
    V3_0,
    V3_1,
}

impl EpubVersion {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "3.0" => Some(EpubVersion::V3_0),
            "3.1" => Some(EpubVersion::V3_1),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EpubVersion::V3_0 => "3.0",
            EpubVersion::V3_1 => "3.1",
        }
    }
}

/// The manifest item carrying the `nav` property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub id: Option<String>,
    /// Href as written in the manifest, relative to the OPF file.
    pub href: String,
    pub media_type: String,
}

/// What has to happen to the Navigation Document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    /// The document already sits at the WebBook entry point.
    AlreadyInPlace { location: String },
    /// Move the document from `from` to `to` (package paths); the manifest
    /// item's new href is `href`.
    Move {
        from: String,
        to: String,
        href: String,
    },
}

/// A parsed OPF file and its package path.
#[derive(Debug, Clone)]
pub struct PackageDocument {
    path: String,
    doc: Document,
}

impl PackageDocument {
    /// Parse the OPF file found at `path` (a package path).
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self> {
        let doc = Document::parse(bytes).map_err(|e| Error::parse(path, e))?;

        if doc.root().local_name() != "package" {
            return Err(Error::InvalidEpub(format!(
                "{path} is rooted at <{}>, not <package>",
                doc.root().name()
            )));
        }

        Ok(PackageDocument {
            path: path::normalize(path),
            doc,
        })
    }

    /// Package path of the OPF file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Directory the manifest hrefs are relative to.
    pub fn dir(&self) -> &str {
        path::parent(&self.path)
    }

    /// Validate the `version` attribute of `<package>`.
    pub fn version(&self) -> Result<EpubVersion> {
        let value = self.doc.root().attr("version");
        value
            .as_deref()
            .and_then(EpubVersion::parse)
            .ok_or_else(|| {
                Error::IncompatibleVersion(value.as_deref().unwrap_or("(none)").to_string())
            })
    }

    /// The Navigation Document's manifest item.
    ///
    /// Fails when there is none, when it has no href, or when it is not XHTML
    /// (an NCX file, for instance).
    pub fn nav_item(&self) -> Result<NavItem> {
        let element = self
            .doc
            .elements()
            .into_iter()
            .find(|e| is_nav_item(e))
            .ok_or_else(|| Error::MissingElement("navigation document".into()))?;

        let href = element
            .attr("href")
            .ok_or_else(|| Error::MissingElement("href on the navigation item".into()))?;
        let media_type = element.attr("media-type").unwrap_or_default();

        if media_type != XHTML_MEDIA_TYPE {
            return Err(Error::UnsupportedFormat(format!(
                "the Navigation Document is not a XHTML document (media-type \"{media_type}\")"
            )));
        }

        Ok(NavItem {
            id: element.attr("id").map(|id| id.into_owned()),
            href: href.into_owned(),
            media_type: media_type.into_owned(),
        })
    }

    /// Work out whether the Navigation Document named by `item` must move to
    /// `target`, the package path of the WebBook entry point.
    pub fn plan(&self, item: &NavItem, target: &str) -> Result<Relocation> {
        let (href, _) = path::split_suffix(&item.href);
        let location = path::join(self.dir(), &path::decode_href(href));

        if path::escapes_root(&location) {
            return Err(Error::InvalidEpub(format!(
                "navigation document {} lies outside the package",
                item.href
            )));
        }

        let target = path::normalize(target);
        if location == target {
            return Ok(Relocation::AlreadyInPlace { location });
        }

        let href = path::encode_href(&path::relative(self.dir(), &target));
        Ok(Relocation::Move {
            from: location,
            to: target,
            href,
        })
    }

    /// Point the navigation item at `href`.
    pub fn set_nav_href(&mut self, href: &str) -> Result<()> {
        let mut updated = false;
        self.doc.visit_mut(|element, _| {
            if !updated && is_nav_item(element) {
                element.set_attr("href", href);
                updated = true;
            }
        });

        if updated {
            Ok(())
        } else {
            Err(Error::MissingElement("navigation document".into()))
        }
    }

    /// Serialize the package document.
    pub fn to_xml(&self) -> String {
        self.doc.to_xml()
    }
}

/// A manifest `item` whose `properties` list contains `nav`.
fn is_nav_item(element: &Element) -> bool {
    element.local_name() == "item"
        && element
            .attr("properties")
            .is_some_and(|props| props.split_ascii_whitespace().any(|p| p == "nav"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opf(version: &str, items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="{version}" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Test</dc:title>
  </metadata>
  <manifest>
{items}
  </manifest>
  <spine><itemref idref="c1"/></spine>
</package>
"#
        )
    }

    const NAV_ITEM: &str = r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#;

    fn package(path: &str, version: &str, items: &str) -> PackageDocument {
        PackageDocument::parse(path, opf(version, items).as_bytes()).unwrap()
    }

    #[test]
    fn test_version_gate() {
        assert_eq!(
            package("OEBPS/package.opf", "3.0", NAV_ITEM).version().unwrap(),
            EpubVersion::V3_0
        );
        assert_eq!(
            package("OEBPS/package.opf", "3.1", NAV_ITEM).version().unwrap(),
            EpubVersion::V3_1
        );

        for version in ["2.0", "3.2", "3", " 3.0", ""] {
            let err = package("OEBPS/package.opf", version, NAV_ITEM)
                .version()
                .unwrap_err();
            assert!(
                matches!(err, Error::IncompatibleVersion(ref v) if v == version),
                "version {version:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_missing_version() {
        let pkg = PackageDocument::parse("content.opf", b"<package><manifest/></package>").unwrap();
        assert!(matches!(pkg.version(), Err(Error::IncompatibleVersion(v)) if v == "(none)"));
    }

    #[test]
    fn test_rejects_non_package_root() {
        let err = PackageDocument::parse("content.opf", b"<html/>").unwrap_err();
        assert!(matches!(err, Error::InvalidEpub(_)));
    }

    #[test]
    fn test_nav_item() {
        let item = package("OEBPS/package.opf", "3.0", NAV_ITEM).nav_item().unwrap();
        assert_eq!(item.id.as_deref(), Some("nav"));
        assert_eq!(item.href, "nav.xhtml");
        assert_eq!(item.media_type, XHTML_MEDIA_TYPE);
    }

    #[test]
    fn test_nav_item_among_other_properties() {
        let items = r#"    <item id="toc" href="toc.xhtml" media-type="application/xhtml+xml" properties="scripted nav"/>"#;
        let item = package("package.opf", "3.0", items).nav_item().unwrap();
        assert_eq!(item.href, "toc.xhtml");
    }

    #[test]
    fn test_missing_nav_item() {
        let items = r#"    <item id="c1" href="ch1.xhtml" media-type="application/xhtml+xml"/>"#;
        let err = package("package.opf", "3.0", items).nav_item().unwrap_err();
        assert!(matches!(err, Error::MissingElement(_)));
    }

    #[test]
    fn test_nav_item_must_be_xhtml() {
        let items = r#"    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml" properties="nav"/>"#;
        let err = package("package.opf", "3.0", items).nav_item().unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_plan_moves_nav_to_root() {
        let pkg = package("OEBPS/package.opf", "3.0", NAV_ITEM);
        assert_eq!(
            pkg.plan(&pkg.nav_item().unwrap(), "index.xhtml").unwrap(),
            Relocation::Move {
                from: "OEBPS/nav.xhtml".into(),
                to: "index.xhtml".into(),
                href: "../index.xhtml".into(),
            }
        );
    }

    #[test]
    fn test_plan_nav_in_subdirectory_of_root_package() {
        let items = r#"    <item id="nav" href="text/nav%20doc.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#;
        let pkg = package("content.opf", "3.0", items);
        assert_eq!(
            pkg.plan(&pkg.nav_item().unwrap(), "index.xhtml").unwrap(),
            Relocation::Move {
                from: "text/nav doc.xhtml".into(),
                to: "index.xhtml".into(),
                href: "index.xhtml".into(),
            }
        );
    }

    #[test]
    fn test_plan_already_in_place() {
        let items = r#"    <item id="nav" href="../index.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#;
        let pkg = package("OEBPS/package.opf", "3.0", items);
        assert_eq!(
            pkg.plan(&pkg.nav_item().unwrap(), "index.xhtml").unwrap(),
            Relocation::AlreadyInPlace {
                location: "index.xhtml".into()
            }
        );

        let items = r#"    <item id="nav" href="./index.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#;
        let pkg = package("package.opf", "3.1", items);
        assert!(matches!(
            pkg.plan(&pkg.nav_item().unwrap(), "index.xhtml").unwrap(),
            Relocation::AlreadyInPlace { .. }
        ));
    }

    #[test]
    fn test_plan_rejects_nav_outside_package() {
        let items = r#"    <item id="nav" href="../../nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#;
        let pkg = package("OEBPS/package.opf", "3.0", items);
        let err = pkg.plan(&pkg.nav_item().unwrap(), "index.xhtml").unwrap_err();
        assert!(matches!(err, Error::InvalidEpub(_)));
    }

    #[test]
    fn test_plan_uses_given_item() {
        let pkg = package("OEBPS/package.opf", "3.0", NAV_ITEM);
        let item = NavItem {
            id: None,
            href: "text/toc.xhtml#top".into(),
            media_type: XHTML_MEDIA_TYPE.into(),
        };
        assert_eq!(
            pkg.plan(&item, "index.xhtml").unwrap(),
            Relocation::Move {
                from: "OEBPS/text/toc.xhtml".into(),
                to: "index.xhtml".into(),
                href: "../index.xhtml".into(),
            }
        );
    }

    #[test]
    fn test_plan_entry_point_with_colon() {
        let pkg = package("package.opf", "3.0", NAV_ITEM);
        let plan = pkg.plan(&pkg.nav_item().unwrap(), "web:index.xhtml").unwrap();
        assert!(matches!(plan, Relocation::Move { ref href, .. } if href == "./web:index.xhtml"));
    }

    #[test]
    fn test_set_nav_href_preserves_other_markup() {
        let mut pkg = package("OEBPS/package.opf", "3.0", NAV_ITEM);
        pkg.set_nav_href("../index.xhtml").unwrap();

        let expected = opf("3.0", NAV_ITEM).replace(
            r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
            r#"<item id="nav" href="../index.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
        );
        assert_eq!(pkg.to_xml(), expected);
        assert_eq!(pkg.nav_item().unwrap().href, "../index.xhtml");
    }
}
