//! XML document model and compiled path matching.
//!
//! The command mux needs two primitives from an XML engine: parse a frame
//! body into a document, and test whether a compiled path expression
//! selects an element. This module builds both on `quick-xml`'s
//! namespace-resolving pull parser.
//!
//! [`Path`] supports the expression subset emitted by
//! [`crate::xmlpath::XmlPathBuilder`]: absolute (`/a/b`) and descendant
//! (`//a/b`) chains of steps, each step optionally constrained with a
//! `[namespace-uri()='…']` predicate.

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

/// Errors produced while parsing a frame body into a [`Document`].
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The body is not well-formed XML.
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),
    /// The body contains no root element.
    #[error("document has no root element")]
    NoRoot,
    /// The body ended with open elements.
    #[error("document ended with unclosed elements")]
    Unclosed,
    /// The body contains more than one top-level element.
    #[error("document has multiple root elements")]
    MultipleRoots,
    /// An element or attribute uses an undeclared namespace prefix.
    #[error("unbound namespace prefix: {0}")]
    UnboundPrefix(String),
}

/// Errors produced while compiling a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The expression is empty.
    #[error("empty path expression")]
    Empty,
    /// A step has no element name or the expression contains `//` after
    /// the first step.
    #[error("empty step in path expression: {0}")]
    EmptyStep(String),
    /// A step predicate is not of the form `[namespace-uri()='…']`.
    #[error("unsupported step predicate: {0}")]
    InvalidPredicate(String),
}

/// An attribute on an [`Element`], name as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified attribute name.
    pub name: String,
    /// Unescaped attribute value.
    pub value: String,
}

/// One element of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    namespace: String,
    attributes: Vec<Attribute>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Local element name, without any prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved namespace URI, empty when the element is in no namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Concatenated character data directly inside this element.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attributes in source order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up an attribute value by its qualified name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Child elements in document order.
    #[must_use]
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Finds the first element below this one selected by `path`.
    ///
    /// Descendant paths search this element and its whole subtree;
    /// other paths are matched against the direct children.
    #[must_use]
    pub fn find(&self, path: &Path) -> Option<&Element> {
        if path.descendant {
            find_anywhere(self, &path.steps)
        } else {
            self.children
                .iter()
                .find_map(|child| match_at(child, &path.steps))
        }
    }
}

/// A parsed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parses a frame body into a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the body is not a well-formed XML
    /// document with exactly one root element and fully declared
    /// namespace prefixes.
    pub fn parse(data: &[u8]) -> Result<Self, DocumentError> {
        let mut reader = NsReader::from_reader(data);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (resolve, event) = reader.read_resolved_event()?;
            match event {
                Event::Start(start) => {
                    stack.push(element_from_start(&resolve, &start)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&resolve, &start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // The reader validates end-name pairing, so the stack
                    // cannot be empty here.
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(text) => {
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(cdata) => {
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&String::from_utf8_lossy(&cdata));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(DocumentError::Unclosed);
        }

        root.map(|root| Self { root }).ok_or(DocumentError::NoRoot)
    }

    /// The document's root element.
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Finds the first element selected by `path`, in document order.
    ///
    /// Absolute paths are anchored at the root element; descendant paths
    /// match a chain starting at any element.
    #[must_use]
    pub fn find(&self, path: &Path) -> Option<&Element> {
        if path.descendant {
            find_anywhere(&self.root, &path.steps)
        } else {
            match_at(&self.root, &path.steps)
        }
    }
}

fn attach(
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(DocumentError::MultipleRoots);
    }
    *root = Some(element);
    Ok(())
}

fn element_from_start(
    resolve: &ResolveResult<'_>,
    start: &BytesStart<'_>,
) -> Result<Element, DocumentError> {
    let namespace = match resolve {
        ResolveResult::Bound(ns) => String::from_utf8_lossy(ns.0).into_owned(),
        ResolveResult::Unbound => String::new(),
        ResolveResult::Unknown(prefix) => {
            return Err(DocumentError::UnboundPrefix(
                String::from_utf8_lossy(prefix).into_owned(),
            ));
        }
    };

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        attributes.push(Attribute {
            name: String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            value: attribute.unescape_value()?.into_owned(),
        });
    }

    Ok(Element {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        namespace,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

/// One compiled step: an element name plus an optional namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    name: String,
    namespace: Option<String>,
}

impl Step {
    fn matches(&self, element: &Element) -> bool {
        if self.name != element.name {
            return false;
        }
        match &self.namespace {
            Some(uri) => *uri == element.namespace,
            None => true,
        }
    }
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    descendant: bool,
    steps: Vec<Step>,
}

impl Path {
    /// Compiles a path expression.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] when the expression is empty, contains an
    /// empty step, or uses a predicate other than
    /// `[namespace-uri()='…']`.
    pub fn compile(expr: &str) -> Result<Self, PathError> {
        let (descendant, rest) = match expr.strip_prefix("//") {
            Some(rest) => (true, rest),
            None => (false, expr.strip_prefix('/').unwrap_or(expr)),
        };

        if rest.is_empty() {
            return Err(PathError::Empty);
        }

        let steps = rest
            .split('/')
            .map(|step| compile_step(step, expr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { descendant, steps })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 || !self.descendant {
                f.write_str("/")?;
            } else {
                f.write_str("//")?;
            }
            f.write_str(&step.name)?;
            if let Some(uri) = &step.namespace {
                write!(f, "[namespace-uri()='{uri}']")?;
            }
        }
        Ok(())
    }
}

fn compile_step(step: &str, expr: &str) -> Result<Step, PathError> {
    if step.is_empty() {
        return Err(PathError::EmptyStep(expr.to_string()));
    }

    let (name, namespace) = match step.find('[') {
        None => (step, None),
        Some(at) => {
            let (name, predicate) = step.split_at(at);
            let uri = predicate
                .strip_prefix("[namespace-uri()='")
                .and_then(|p| p.strip_suffix("']"))
                .ok_or_else(|| PathError::InvalidPredicate(step.to_string()))?;
            (name, Some(uri.to_string()))
        }
    };

    if name.is_empty() || name.contains(']') {
        return Err(PathError::EmptyStep(expr.to_string()));
    }

    Ok(Step {
        name: name.to_string(),
        namespace,
    })
}

fn match_at<'a>(element: &'a Element, steps: &[Step]) -> Option<&'a Element> {
    let (first, rest) = steps.split_first()?;
    if !first.matches(element) {
        return None;
    }
    if rest.is_empty() {
        return Some(element);
    }
    element
        .children
        .iter()
        .find_map(|child| match_at(child, rest))
}

fn find_anywhere<'a>(element: &'a Element, steps: &[Step]) -> Option<&'a Element> {
    if let Some(found) = match_at(element, steps) {
        return Some(found);
    }
    element
        .children
        .iter()
        .find_map(|child| find_anywhere(child, steps))
}
