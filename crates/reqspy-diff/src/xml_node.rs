//! XML node model and its `quick-xml` front end.
//!
//! An [`XmlElement`] owns its attributes, its child elements, and its
//! text. An element is a *leaf* when it has no child elements; only
//! leaves are compared by text.
//!
//! Parsing keeps text verbatim except that whitespace-only text nodes
//! (indentation between elements) are dropped. Namespace declarations
//! (`xmlns`, `xmlns:p`) are recorded separately from attributes, and every
//! element's namespace URI is resolved against the declarations in scope.

use std::borrow::Cow;

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use reqspy_types::{XmlPath, XmlStep};

use crate::error::{DiffError, DiffResult};

/// An XML element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `soap:Body`.
    pub name: String,
    /// Resolved namespace URI, if the element is in a namespace.
    pub namespace: Option<String>,
    /// Attributes keyed by qualified name, in document order.
    pub attributes: IndexMap<String, String>,
    /// Namespace declarations made on this element: prefix (empty for the
    /// default namespace) to URI.
    pub namespaces: IndexMap<String, String>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
    /// Text content directly inside this element.
    pub text: String,
}

impl XmlElement {
    /// An empty element called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder: add or replace an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder: append a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Builder: set the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Parse an XML document and return its document element.
    pub fn parse(text: &str) -> DiffResult<Self> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(false);

        let mut buf = Vec::new();
        let mut open: Vec<XmlElement> = Vec::new();
        let mut scopes: Vec<IndexMap<String, String>> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    return Err(invalid(format!(
                        "malformed XML at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
            };

            match event {
                Event::Start(start) => {
                    open.push(open_element(&start, &mut scopes)?);
                }
                Event::Empty(start) => {
                    let element = open_element(&start, &mut scopes)?;
                    scopes.pop();
                    close_element(element, &mut open, &mut root)?;
                }
                Event::End(_) => {
                    scopes.pop();
                    let element = open.pop().ok_or_else(|| invalid("unbalanced end tag"))?;
                    close_element(element, &mut open, &mut root)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| invalid(format!("malformed text: {e}")))?;
                    if !text.trim().is_empty() {
                        append_text(&mut open, &text)?;
                    }
                }
                Event::CData(data) => {
                    let bytes = data.into_inner();
                    append_text(&mut open, &String::from_utf8_lossy(&bytes))?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype.
                _ => {}
            }
            buf.clear();
        }

        if let Some(unclosed) = open.last() {
            return Err(invalid(format!("unclosed element <{}>", unclosed.name)));
        }
        root.ok_or_else(|| invalid("document has no root element"))
    }

    /// Serialize `value` with `quick_xml::se` and parse the result.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> DiffResult<Self> {
        let text = quick_xml::se::to_string(value)
            .map_err(|e| invalid(format!("value is not serializable as XML: {e}")))?;
        Self::parse(&text)
    }

    /// The name without its prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// The prefix of the qualified name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Returns `true` if the element has no child elements.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Value of the attribute with qualified name `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The `position`-th (1-based) child whose local name is `name`.
    pub fn child(&self, name: &str, position: usize) -> Option<&XmlElement> {
        let skip = position.checked_sub(1)?;
        self.children
            .iter()
            .filter(|c| c.local_name() == name)
            .nth(skip)
    }

    /// Resolve `path` with this element as the document element `/`.
    ///
    /// Unpinned steps select the first child with that name. Attribute
    /// steps do not select an element.
    pub fn find(&self, path: &XmlPath) -> Option<&XmlElement> {
        path.steps().iter().try_fold(self, |current, step| match step {
            XmlStep::Element { name, position } => current.child(name, position.unwrap_or(1)),
            XmlStep::Attribute(_) => None,
        })
    }

    /// All text below this element: its own text followed by the value of
    /// each child, in order.
    pub fn value(&self) -> String {
        let mut value = self.text.clone();
        for child in &self.children {
            value.push_str(&child.value());
        }
        value
    }

    /// This element and every element below it, depth first.
    pub fn descendants_and_self(&self) -> Vec<&XmlElement> {
        let mut found = vec![self];
        for child in &self.children {
            found.extend(child.descendants_and_self());
        }
        found
    }
}

pub(crate) fn local_part(qualified: &str) -> &str {
    qualified
        .split_once(':')
        .map_or(qualified, |(_, local)| local)
}

fn invalid(reason: impl Into<String>) -> DiffError {
    DiffError::InvalidNode(reason.into())
}

fn utf8(bytes: &[u8]) -> DiffResult<Cow<'_, str>> {
    std::str::from_utf8(bytes)
        .map(Cow::Borrowed)
        .map_err(|e| invalid(format!("name is not UTF-8: {e}")))
}

fn open_element(
    start: &BytesStart<'_>,
    scopes: &mut Vec<IndexMap<String, String>>,
) -> DiffResult<XmlElement> {
    let mut element = XmlElement::new(utf8(start.name().as_ref())?);

    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|e| invalid(format!("malformed attribute on <{}>: {e}", element.name)))?;
        let key = utf8(attribute.key.as_ref())?.into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| invalid(format!("malformed value of {key:?}: {e}")))?
            .into_owned();

        if key == "xmlns" {
            element.namespaces.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            element.namespaces.insert(prefix.to_string(), value);
        } else {
            element.attributes.insert(key, value);
        }
    }

    let mut scope = scopes.last().cloned().unwrap_or_default();
    scope.extend(
        element
            .namespaces
            .iter()
            .map(|(prefix, uri)| (prefix.clone(), uri.clone())),
    );
    element.namespace = scope
        .get(element.prefix().unwrap_or(""))
        .filter(|uri| !uri.is_empty())
        .cloned();
    scopes.push(scope);

    Ok(element)
}

fn close_element(
    element: XmlElement,
    open: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> DiffResult<()> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(invalid(format!(
            "second document element <{}>",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

fn append_text(open: &mut [XmlElement], text: &str) -> DiffResult<()> {
    let current = open
        .last_mut()
        .ok_or_else(|| invalid("text outside the document element"))?;
    current.text.push_str(text);
    Ok(())
}
