//! In-memory tree for Android XML documents
//!
//! Both `AndroidManifest.xml` and `res/values/strings.xml` are small enough to
//! hold entirely in memory, so they are parsed once into an [`Element`] tree
//! and every later pass works on the tree instead of re-reading events.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised while building a [`Document`]
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML at byte {position}: {source}")]
    Syntax {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("element <{0}> is never closed")]
    Unclosed(String),

    #[error("unexpected second root element <{0}>")]
    MultipleRoots(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("character data outside the root element at byte {0}")]
    TextOutsideRoot(usize),
}

/// A single XML element with its attributes, text and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Qualified tag name, e.g. `intent-filter`
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value by qualified name, e.g. `android:name`
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value, or `default` when the attribute is not declared
    pub fn attr_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attr(name).unwrap_or(default)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All child elements in document order
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First direct child with the given tag
    pub fn select_element(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Direct children with the given tag, in document order
    pub fn select_elements<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Concatenated character data directly inside this element
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// A parsed XML document with exactly one root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn from_root(root: Element) -> Self {
        Self { root }
    }

    /// Read and parse a file from disk
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let document = Self::parse(&contents)?;
        debug!(
            "Parsed {} with root <{}>",
            path.display(),
            document.root.tag
        );
        Ok(document)
    }

    /// Parse a document from a string
    ///
    /// Anything that is not well-formed is rejected: mismatched or unclosed
    /// tags, broken attributes, bad escapes and a second root element.
    pub fn parse(contents: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(contents);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|source| syntax(&reader, source))?;

            match event {
                Event::Start(ref e) => {
                    let element = start_element(&reader, e)?;
                    if stack.is_empty() {
                        check_single_root(&root, &element)?;
                    }
                    stack.push(element);
                }
                Event::Empty(ref e) => {
                    let element = start_element(&reader, e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // quick-xml has already verified the end tag matches
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(ref e) => {
                    let text = e.unescape().map_err(|source| syntax(&reader, source))?;
                    match stack.last_mut() {
                        Some(current) => current.text.push_str(&text),
                        None if !text.trim().is_empty() => {
                            return Err(DocumentError::TextOutsideRoot(reader.buffer_position()));
                        }
                        None => {}
                    }
                }
                Event::CData(ref e) => match stack.last_mut() {
                    Some(current) => current.text.push_str(&String::from_utf8_lossy(e)),
                    None => return Err(DocumentError::TextOutsideRoot(reader.buffer_position())),
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(DocumentError::Unclosed(open.tag));
        }

        root.map(Self::from_root).ok_or(DocumentError::NoRoot)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The root element, only if its tag is `tag`
    pub fn select_root(&self, tag: &str) -> Option<&Element> {
        (self.root.tag == tag).then_some(&self.root)
    }
}

fn syntax(reader: &Reader<&[u8]>, source: quick_xml::Error) -> DocumentError {
    DocumentError::Syntax {
        position: reader.buffer_position(),
        source,
    }
}

fn start_element(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Element, DocumentError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));

    for attr in start.attributes() {
        let attr = attr.map_err(|e| syntax(reader, e.into()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|source| syntax(reader, source))?
            .to_string();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn check_single_root(root: &Option<Element>, next: &Element) -> Result<(), DocumentError> {
    if root.is_some() {
        return Err(DocumentError::MultipleRoots(next.tag.clone()));
    }
    Ok(())
}

/// Hand a finished element to its parent, or make it the root
fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            check_single_root(root, &element)?;
            *root = Some(element);
        }
    }
    Ok(())
}
