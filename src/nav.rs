//! Navigation Document rewriting.
//!
//! The Navigation Document becomes the WebBook's entry point, so it moves to
//! a new directory. Every reference it holds is rebased on that directory and
//! the table of contents gains the `doc-toc` landmark role.

use tracing::debug;

use crate::error::{Error, Result};
use crate::path;
use crate::xml::Document;

/// Namespace of the `epub:type` structural semantics attribute.
pub const OPS_NAMESPACE: &str = "http://www.idpf.org/2007/ops";

/// ARIA role marking the table of contents.
pub const TOC_ROLE: &str = "doc-toc";

/// Counts of the reference attributes visited during a rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Values changed to reach their target from the new location.
    pub rewritten: usize,
    /// Fragments, external URLs and values that already pointed correctly.
    pub untouched: usize,
}

/// Rewrite a Navigation Document moving from `from` to `to` (package paths).
///
/// Rebases every `href`, every `src` and every `<video poster>`, then tags the
/// `epub:type="toc"` element with `role="doc-toc"`. The document is only
/// modified in memory; writing it out is up to the caller.
pub fn rewrite(doc: &mut Document, from: &str, to: &str) -> Result<RewriteReport> {
    let old_dir = path::parent(from);
    let new_dir = path::parent(to);
    let mut report = RewriteReport::default();

    doc.visit_mut(|element, _| {
        let is_video = element.local_name() == "video";
        let references: Vec<(String, String)> = element
            .attributes()
            .filter(|(name, _)| matches!(*name, "href" | "src") || (is_video && *name == "poster"))
            .map(|(name, value)| (name.to_string(), value.into_owned()))
            .collect();

        for (name, value) in references {
            match path::rebase_href(&value, old_dir, new_dir) {
                Some(rebased) if rebased != value => {
                    debug!("{name}: {value} -> {rebased}");
                    element.set_attr(&name, &rebased);
                    report.rewritten += 1;
                }
                _ => report.untouched += 1,
            }
        }
    });

    mark_toc(doc)?;
    Ok(report)
}

/// Give the first `epub:type="toc"` element the `doc-toc` role, and take it
/// away from any other element.
fn mark_toc(doc: &mut Document) -> Result<()> {
    let mut found = false;

    doc.visit_mut(|element, scope| {
        let is_toc = !found
            && element
                .attr_ns(scope, OPS_NAMESPACE, "type")
                .is_some_and(|types| types.split_ascii_whitespace().any(|t| t == "toc"));

        if is_toc {
            element.set_attr("role", TOC_ROLE);
            found = true;
        } else if element.attr("role").is_some_and(|role| role == TOC_ROLE) {
            debug!("dropping stray {TOC_ROLE} role on <{}>", element.name());
            element.remove_attr("role");
        }
    });

    if found {
        Ok(())
    } else {
        Err(Error::MissingElement("toc nav element in Navigation Document".into()))
    }
}
