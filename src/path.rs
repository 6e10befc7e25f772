//! Path algebra for documents that move inside a package.
//!
//! Locations are *package paths*: forward-slash strings relative to the
//! package root, e.g. `OEBPS/text/ch01.xhtml`. The root itself is `""`.
//! Keeping everything in this form means the rewritten values can be
//! embedded in XML attributes as-is, whatever the host OS separator is.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Characters that can't appear verbatim in the path part of an href.
const HREF_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Normalize a package path, collapsing `.`, `..` and empty segments.
///
/// `..` segments that would climb above the root are kept at the front so
/// the caller can detect them with [`escapes_root`].
///
/// ```
/// use webbook::path::normalize;
///
/// assert_eq!(normalize("OEBPS/./text/../nav.xhtml"), "OEBPS/nav.xhtml");
/// assert_eq!(normalize("a/../../b"), "../b");
/// ```
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }

    parts.join("/")
}

/// Directory containing a package path (`""` for files at the root).
pub fn parent(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Resolve a relative reference against a directory.
///
/// e.g., `join("OEBPS/text", "../images/foo.png")` -> `"OEBPS/images/foo.png"`
pub fn join(dir: &str, relative: &str) -> String {
    if dir.is_empty() {
        normalize(relative)
    } else {
        normalize(&format!("{dir}/{relative}"))
    }
}

/// Relative reference from directory `from_dir` to the package path `to`.
///
/// Both arguments are normalized first. When `to` is `from_dir` itself the
/// result is `"./"`, never an empty string.
///
/// ```
/// use webbook::path::relative;
///
/// assert_eq!(relative("OEBPS", "index.xhtml"), "../index.xhtml");
/// assert_eq!(relative("", "OEBPS/ch1.xhtml"), "OEBPS/ch1.xhtml");
/// ```
pub fn relative(from_dir: &str, to: &str) -> String {
    let from = normalize(from_dir);
    let to = normalize(to);

    let from_parts: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::with_capacity(from_parts.len() + to_parts.len());
    parts.extend(std::iter::repeat_n("..", from_parts.len() - common));
    parts.extend(&to_parts[common..]);

    match parts.first() {
        None => "./".to_string(),
        // `a:b.xhtml` would read as a URL with scheme `a`
        Some(first) if first.contains(':') => format!("./{}", parts.join("/")),
        Some(_) => parts.join("/"),
    }
}

/// True if the path points above the package root.
pub fn escapes_root(path: &str) -> bool {
    normalize(path).split('/').next() == Some("..")
}

/// Map a package path onto the filesystem below `root`.
///
/// Segments are pushed one by one so the result uses the native separator.
pub fn to_fs_path(root: &Path, path: &str) -> PathBuf {
    let mut result = root.to_path_buf();
    for segment in normalize(path).split('/').filter(|s| !s.is_empty()) {
        result.push(segment);
    }
    result
}

/// Percent-decode the path part of an href so it can name a file.
pub fn decode_href(href: &str) -> Cow<'_, str> {
    percent_decode_str(href).decode_utf8_lossy()
}

/// Percent-encode a package path for use as an href.
pub fn encode_href(path: &str) -> String {
    utf8_percent_encode(path, HREF_PATH).to_string()
}

/// Split an href into its path part and its `?query`/`#fragment` suffix.
pub fn split_suffix(href: &str) -> (&str, &str) {
    match href.find(['?', '#']) {
        Some(i) => href.split_at(i),
        None => (href, ""),
    }
}

/// True for references that don't name a file inside the package:
/// scheme-qualified URLs (`https:`, `mailto:`, `data:`...), protocol-relative
/// URLs and absolute paths.
pub fn is_external(href: &str) -> bool {
    if href.starts_with('/') {
        return true;
    }

    let (path, _) = split_suffix(href);
    match path.find(':') {
        Some(colon) => {
            let scheme = &path[..colon];
            let first_slash = path.find('/').unwrap_or(path.len());
            colon < first_slash
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// True for references into the document that holds them.
///
/// Any value starting with `#` qualifies, including the odd literal `#'`.
pub fn is_local_fragment(href: &str) -> bool {
    href.starts_with('#')
}

/// Rewrite an href written relative to `old_dir` so it reaches the same
/// resource from `new_dir`.
///
/// Returns `None` when the value must be left untouched: empty values,
/// same-document fragments and external references. Whitespace around the
/// value is kept as found; only the reference between it is rewritten.
///
/// ```
/// use webbook::path::rebase_href;
///
/// assert_eq!(
///     rebase_href("text/ch1.xhtml#s2", "OEBPS", "").as_deref(),
///     Some("OEBPS/text/ch1.xhtml#s2")
/// );
/// assert_eq!(rebase_href("#toc", "OEBPS", ""), None);
/// ```
pub fn rebase_href(href: &str, old_dir: &str, new_dir: &str) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty() || is_local_fragment(trimmed) || is_external(trimmed) {
        return None;
    }

    let (path, suffix) = split_suffix(trimmed);
    if path.is_empty() {
        // `?query` only: still the same document
        return None;
    }

    let start = href.len() - href.trim_start().len();
    let end = start + trimmed.len();

    let target = join(old_dir, path);
    let mut rebased = href[..start].to_string();
    rebased.push_str(&relative(new_dir, &target));
    if path.ends_with('/') && !rebased.ends_with('/') {
        rebased.push('/');
    }
    rebased.push_str(suffix);
    rebased.push_str(&href[end..]);
    Some(rebased)
}
