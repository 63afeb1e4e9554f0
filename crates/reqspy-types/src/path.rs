//! Location paths rendered while the differs descend both trees.
//!
//! Two flavours share the [`DocumentPath`] contract:
//!
//! - [`JsonPath`] -- `$` root, `.name` / `['odd name']` members, 0-based `[n]` indices.
//! - [`XmlPath`] -- `/` root (the document element itself), `/name` children,
//!   1-based `/name[n]` for repeated names, `/@name` attributes.
//!
//! Paths are values: appending returns a new path and never mutates the
//! parent, so a path can be handed to every child of a node.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypeError};

/// A rendered location inside a document.
///
/// Exclusion patterns are matched against [`DocumentPath::as_str`].
pub trait DocumentPath: fmt::Display {
    /// The rendered form of the path.
    fn as_str(&self) -> &str;
}

// ---------------------------------------------------------------
// JSON
// ---------------------------------------------------------------

/// Location inside a JSON document, e.g. `$.Orders[2].Id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JsonPath {
    rendered: String,
}

impl JsonPath {
    /// The document root, `$`.
    pub fn root() -> Self {
        Self {
            rendered: "$".to_string(),
        }
    }

    /// Path to the member `name` of the object at this path.
    pub fn property(&self, name: &str) -> Self {
        let rendered = if is_plain_member_name(name) {
            format!("{}.{}", self.rendered, name)
        } else {
            format!("{}['{}']", self.rendered, name.replace('\'', "\\'"))
        };
        Self { rendered }
    }

    /// Path to the element at 0-based `index` of the array at this path.
    pub fn index(&self, index: usize) -> Self {
        Self {
            rendered: format!("{}[{}]", self.rendered, index),
        }
    }

    /// Returns `true` for the document root.
    pub fn is_root(&self) -> bool {
        self.rendered == "$"
    }
}

impl Default for JsonPath {
    fn default() -> Self {
        Self::root()
    }
}

fn is_plain_member_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| matches!(c, '.' | '\'' | '[' | ']') || c.is_whitespace())
}

impl DocumentPath for JsonPath {
    fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

// ---------------------------------------------------------------
// XML
// ---------------------------------------------------------------

/// One step of an [`XmlPath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XmlStep {
    /// A child element, optionally pinned to a 1-based position among its
    /// same-named siblings.
    Element {
        name: String,
        position: Option<usize>,
    },
    /// An attribute of the current element. Always the last step.
    Attribute(String),
}

impl XmlStep {
    fn parse(raw: &str, whole: &str) -> Result<Self> {
        if let Some(name) = raw.strip_prefix('@') {
            if name.is_empty() {
                return Err(TypeError::path(whole, "attribute step has no name"));
            }
            return Ok(Self::Attribute(name.to_string()));
        }

        let Some(open) = raw.find('[') else {
            return Ok(Self::Element {
                name: raw.to_string(),
                position: None,
            });
        };

        let name = &raw[..open];
        if name.is_empty() {
            return Err(TypeError::path(whole, format!("step {raw:?} has no name")));
        }
        let position = raw[open + 1..]
            .strip_suffix(']')
            .and_then(|digits| digits.parse::<usize>().ok())
            .filter(|position| *position > 0)
            .ok_or_else(|| {
                TypeError::path(whole, format!("step {raw:?} has an invalid position"))
            })?;

        Ok(Self::Element {
            name: name.to_string(),
            position: Some(position),
        })
    }
}

impl fmt::Display for XmlStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element {
                name,
                position: None,
            } => f.write_str(name),
            Self::Element {
                name,
                position: Some(position),
            } => write!(f, "{name}[{position}]"),
            Self::Attribute(name) => write!(f, "@{name}"),
        }
    }
}

/// Location inside an XML document, e.g. `/Items/Item[2]/@sku`.
///
/// The root `/` designates the document element itself; the first step
/// selects one of its children.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XmlPath {
    steps: Vec<XmlStep>,
    rendered: String,
}

impl XmlPath {
    /// The document element, `/`.
    pub fn root() -> Self {
        Self {
            steps: Vec::new(),
            rendered: "/".to_string(),
        }
    }

    /// Parse a slash-separated path. Leading, trailing, and doubled
    /// slashes are ignored, so `"Items/Item[2]"` and `"/Items/Item[2]/"`
    /// are the same path.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::root().append(raw)
    }

    /// Append a raw sub-path, normalising to exactly one slash between
    /// the two operands.
    pub fn append(&self, sub_path: &str) -> Result<Self> {
        let mut path = self.clone();
        for raw in sub_path.split('/').map(str::trim).filter(|s| !s.is_empty()) {
            let step = XmlStep::parse(raw, sub_path)?;
            path = path.push(step).ok_or_else(|| {
                TypeError::path(sub_path, "an attribute step must be the last step")
            })?;
        }
        Ok(path)
    }

    /// Path to the child element `name`.
    pub fn element(&self, name: &str) -> Self {
        self.pushed(XmlStep::Element {
            name: name.to_string(),
            position: None,
        })
    }

    /// Path to the `position`-th (1-based) child element called `name`.
    pub fn indexed(&self, name: &str, position: usize) -> Self {
        self.pushed(XmlStep::Element {
            name: name.to_string(),
            position: Some(position),
        })
    }

    /// Path to the attribute `name` of the element at this path.
    pub fn attribute(&self, name: &str) -> Self {
        self.pushed(XmlStep::Attribute(name.to_string()))
    }

    /// The steps below the root, in order.
    pub fn steps(&self) -> &[XmlStep] {
        &self.steps
    }

    /// Returns `true` for the document element.
    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns `true` if the last step selects an attribute.
    pub fn is_attribute(&self) -> bool {
        matches!(self.steps.last(), Some(XmlStep::Attribute(_)))
    }

    fn pushed(&self, step: XmlStep) -> Self {
        // Attribute paths are leaves; building below one is a caller bug.
        debug_assert!(!self.is_attribute(), "cannot descend below {}", self.rendered);
        let mut path = self.clone();
        path.push_unchecked(step);
        path
    }

    fn push(mut self, step: XmlStep) -> Option<Self> {
        if self.is_attribute() {
            return None;
        }
        self.push_unchecked(step);
        Some(self)
    }

    fn push_unchecked(&mut self, step: XmlStep) {
        if !self.rendered.ends_with('/') {
            self.rendered.push('/');
        }
        self.rendered.push_str(&step.to_string());
        self.steps.push(step);
    }
}

impl Default for XmlPath {
    fn default() -> Self {
        Self::root()
    }
}

impl DocumentPath for XmlPath {
    fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for XmlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}
