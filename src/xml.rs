//! Owned, mutable XML tree with verbatim round-tripping.
//!
//! Documents are read with quick-xml into a small tree of [`Node`]s. Text,
//! comments and untouched start tags keep their source bytes, so serializing
//! a document that was only partly edited reproduces everything else as it
//! was written. An element's tag is rebuilt from its attributes only once one
//! of them has been changed.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{EscapeError, escape, unescape};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// Why a document could not be parsed.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("invalid escape in attribute value: {0}")]
    Escape(#[from] EscapeError),

    #[error("document is not valid UTF-8")]
    Encoding,

    #[error("{0}")]
    Malformed(String),
}

/// A node in the document tree.
///
/// Character data is stored exactly as it appears in the source, entity
/// references included.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    Declaration(String),
    ProcessingInstruction(String),
    DocType(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Attribute {
    name: String,
    /// Escaped value, as written between the quotes.
    raw: String,
}

/// An element with its attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Written as `<name/>` in the source.
    empty: bool,
    /// Source text between `<` and `>` (or `/>`), dropped on the first edit.
    raw_start: Option<String>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>, empty: bool) -> Result<Self, ParseError> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let raw = utf8(&attr.value)?;
            unescape(&raw)?;
            attributes.push(Attribute {
                name: utf8(attr.key.as_ref())?,
                raw,
            });
        }

        Ok(Element {
            name: utf8(start.name().as_ref())?,
            attributes,
            children: Vec::new(),
            empty,
            raw_start: Some(utf8(start.as_ref())?),
        })
    }

    /// Qualified name, prefix included.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Unescaped value of the attribute with this qualified name.
    pub fn attr(&self, name: &str) -> Option<Cow<'_, str>> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| unescape(&a.raw).ok())
    }

    /// Unescaped value of a namespaced attribute, resolving prefixes through
    /// the declarations in scope.
    pub fn attr_ns(&self, scope: &Namespaces, uri: &str, local: &str) -> Option<Cow<'_, str>> {
        self.attributes
            .iter()
            .find(|a| {
                a.name.split_once(':').is_some_and(|(prefix, name)| {
                    name == local && prefix != "xmlns" && scope.resolve(prefix) == Some(uri)
                })
            })
            .and_then(|a| unescape(&a.raw).ok())
    }

    /// Iterate over `(qualified name, unescaped value)` pairs in source order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        self.attributes
            .iter()
            .filter_map(|a| Some((a.name.as_str(), unescape(&a.raw).ok()?)))
    }

    /// Set an attribute, replacing an existing value in place or appending a
    /// new attribute. Setting the current value is a no-op.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let raw = escape(value).into_owned();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) if attr.raw == raw => return,
            Some(attr) => attr.raw = raw,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                raw,
            }),
        }
        self.raw_start = None;
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| a.name != name);
        let removed = self.attributes.len() != before;
        if removed {
            self.raw_start = None;
        }
        removed
    }

    /// Child elements, skipping text and other nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        match &self.raw_start {
            Some(raw) => out.push_str(raw),
            None => {
                out.push_str(&self.name);
                for attr in &self.attributes {
                    let quote = if attr.raw.contains('"') { '\'' } else { '"' };
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push('=');
                    out.push(quote);
                    out.push_str(&attr.raw);
                    out.push(quote);
                }
            }
        }

        if self.empty && self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl Node {
    fn write(&self, out: &mut String) {
        match self {
            Node::Element(e) => e.write(out),
            Node::Text(text) => out.push_str(text),
            Node::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
            Node::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            Node::Declaration(text) | Node::ProcessingInstruction(text) => {
                out.push_str("<?");
                out.push_str(text);
                out.push_str("?>");
            }
            Node::DocType(text) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(text);
                out.push('>');
            }
        }
    }
}

/// Namespace declarations in scope while walking the tree.
#[derive(Debug, Default)]
pub struct Namespaces {
    /// (prefix, uri); the default namespace uses the empty prefix.
    bindings: Vec<(String, String)>,
}

impl Namespaces {
    /// URI bound to a prefix, innermost declaration first.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn enter(&mut self, element: &Element) -> usize {
        let before = self.bindings.len();
        for (name, value) in element.attributes() {
            if name == "xmlns" {
                self.bindings.push((String::new(), value.into_owned()));
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                self.bindings.push((prefix.to_string(), value.into_owned()));
            }
        }
        self.bindings.len() - before
    }

    fn leave(&mut self, count: usize) {
        self.bindings.truncate(self.bindings.len() - count);
    }
}

/// A parsed XML document: one root element plus whatever surrounds it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl Document {
    /// Parse a document from raw bytes.
    ///
    /// The input must be UTF-8 (a BOM is accepted and dropped) and well
    /// formed: matching tags, a single root element, no stray text outside it.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let (content, malformed) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
        if malformed {
            return Err(ParseError::Encoding);
        }

        let mut reader = Reader::from_str(&content);
        let mut builder = TreeBuilder::default();

        loop {
            match reader.read_event()? {
                Event::Start(e) => builder.open.push(Element::from_start(&e, false)?),
                Event::Empty(e) => {
                    let element = Element::from_start(&e, true)?;
                    builder.append(Node::Element(element))?;
                }
                Event::End(_) => {
                    let element = builder
                        .open
                        .pop()
                        .ok_or_else(|| ParseError::Malformed("unexpected end tag".into()))?;
                    builder.append(Node::Element(element))?;
                }
                Event::Text(e) => builder.append_text(&utf8(e.as_ref())?)?,
                Event::GeneralRef(e) => {
                    builder.append_text(&format!("&{};", utf8(e.as_ref())?))?
                }
                Event::CData(e) => builder.append(Node::CData(utf8(e.as_ref())?))?,
                Event::Comment(e) => builder.append(Node::Comment(utf8(e.as_ref())?))?,
                Event::Decl(e) => builder.append(Node::Declaration(utf8(e.as_ref())?))?,
                Event::PI(e) => builder.append(Node::ProcessingInstruction(utf8(e.as_ref())?))?,
                Event::DocType(e) => builder.append(Node::DocType(utf8(e.as_ref())?))?,
                Event::Eof => break,
            }
        }

        builder.finish()
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// All elements in document order, root first.
    pub fn elements(&self) -> Vec<&Element> {
        fn collect<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
            out.push(element);
            for child in element.child_elements() {
                collect(child, out);
            }
        }

        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    /// Visit every element mutably in document order, along with the
    /// namespace declarations in scope at that element.
    pub fn visit_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Element, &Namespaces),
    {
        fn walk<F>(element: &mut Element, scope: &mut Namespaces, f: &mut F)
        where
            F: FnMut(&mut Element, &Namespaces),
        {
            let declared = scope.enter(element);
            f(element, scope);
            for child in &mut element.children {
                if let Node::Element(child) = child {
                    walk(child, scope, f);
                }
            }
            scope.leave(declared);
        }

        let mut scope = Namespaces::default();
        walk(&mut self.root, &mut scope, &mut f);
    }

    /// Serialize the document.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.prolog {
            node.write(&mut out);
        }
        self.root.write(&mut out);
        for node in &self.epilog {
            node.write(&mut out);
        }
        out
    }
}

#[derive(Default)]
struct TreeBuilder {
    prolog: Vec<Node>,
    root: Option<Element>,
    epilog: Vec<Node>,
    open: Vec<Element>,
}

impl TreeBuilder {
    fn append(&mut self, node: Node) -> Result<(), ParseError> {
        if let Some(parent) = self.open.last_mut() {
            parent.children.push(node);
            return Ok(());
        }

        match node {
            Node::Element(element) => {
                if self.root.is_some() {
                    return Err(ParseError::Malformed(format!(
                        "more than one root element (found <{}>)",
                        element.name
                    )));
                }
                self.root = Some(element);
            }
            other if self.root.is_none() => self.prolog.push(other),
            other => self.epilog.push(other),
        }
        Ok(())
    }

    fn append_text(&mut self, text: &str) -> Result<(), ParseError> {
        if self.open.is_empty() && !text.trim().is_empty() {
            return Err(ParseError::Malformed(
                "text content outside the root element".into(),
            ));
        }

        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None if self.root.is_none() => &mut self.prolog,
            None => &mut self.epilog,
        };
        match siblings.last_mut() {
            Some(Node::Text(prev)) => prev.push_str(text),
            _ => siblings.push(Node::Text(text.to_string())),
        }
        Ok(())
    }

    fn finish(self) -> Result<Document, ParseError> {
        if let Some(open) = self.open.last() {
            return Err(ParseError::Malformed(format!(
                "unclosed element <{}>",
                open.name
            )));
        }

        let root = self
            .root
            .ok_or_else(|| ParseError::Malformed("no root element".into()))?;

        Ok(Document {
            prolog: self.prolog,
            root,
            epilog: self.epilog,
        })
    }
}

fn utf8(bytes: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| ParseError::Encoding)
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}
