//! JSON node model.
//!
//! [`JsonNode`] is a closed variant type: the differ matches on it
//! exhaustively instead of inspecting values at runtime. The variant is
//! decided by the serialized shape alone -- an integral number literal is
//! a [`JsonNode::Integer`], any other number a [`JsonNode::Number`].
//!
//! Numbers keep their literal text. Conversion to the scalar domain
//! happens when two numbers are compared, so a literal that does not fit
//! is reported as a difference rather than rejected up front. Integers
//! compare as `i128`, which covers every `i64` and `u64` literal; other
//! numbers compare as [`Decimal`], falling back to `f64` only for
//! magnitudes a decimal cannot hold.

use std::fmt;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::error::{DiffError, DiffResult};

/// The schema-level type of a [`JsonNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "Object",
            Self::Array => "Array",
            Self::String => "String",
            Self::Number => "Number",
            Self::Integer => "Integer",
            Self::Boolean => "Boolean",
            Self::Null => "Null",
        };
        f.write_str(name)
    }
}

/// An in-memory JSON value.
#[derive(Clone, Debug, PartialEq)]
pub enum JsonNode {
    /// Members in document order; names are unique.
    Object(IndexMap<String, JsonNode>),
    Array(Vec<JsonNode>),
    String(String),
    /// A non-integral number literal, e.g. `2.30` or `1e-3`.
    Number(String),
    /// An integral number literal, e.g. `-42`.
    Integer(String),
    Boolean(bool),
    Null,
}

impl JsonNode {
    /// Parse JSON text.
    pub fn parse(text: &str) -> DiffResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DiffError::InvalidNode(format!("malformed JSON: {e}")))?;
        Ok(Self::from_value(value))
    }

    /// Serialize `value` with `serde_json` and convert the result.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> DiffResult<Self> {
        let value = serde_json::to_value(value).map_err(|e| {
            DiffError::InvalidNode(format!("value is not serializable as JSON: {e}"))
        })?;
        Ok(Self::from_value(value))
    }

    /// Convert a `serde_json` value.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(b),
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer(n.to_string()),
            Value::Number(n) => Self::Number(n.to_string()),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from_value).collect()),
            Value::Object(members) => Self::Object(
                members
                    .into_iter()
                    .map(|(name, value)| (name, Self::from_value(value)))
                    .collect(),
            ),
        }
    }

    /// An integer node.
    pub fn integer(value: i64) -> Self {
        Self::Integer(value.to_string())
    }

    /// A number node.
    pub fn number(value: f64) -> Self {
        Self::Number(value.to_string())
    }

    /// A string node.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// An object node from `(name, node)` pairs. Later duplicates replace
    /// earlier ones in place.
    pub fn object<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, JsonNode)>,
        K: Into<String>,
    {
        Self::Object(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An array node.
    pub fn array(items: impl IntoIterator<Item = JsonNode>) -> Self {
        Self::Array(items.into_iter().collect())
    }

    /// The schema-level type of this node.
    pub fn schema_type(&self) -> SchemaType {
        match self {
            Self::Object(_) => SchemaType::Object,
            Self::Array(_) => SchemaType::Array,
            Self::String(_) => SchemaType::String,
            Self::Number(_) => SchemaType::Number,
            Self::Integer(_) => SchemaType::Integer,
            Self::Boolean(_) => SchemaType::Boolean,
            Self::Null => SchemaType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Member `name` of an object node.
    pub fn get(&self, name: &str) -> Option<&JsonNode> {
        match self {
            Self::Object(members) => members.get(name),
            _ => None,
        }
    }

    /// Full structural equality, used to re-match array elements.
    ///
    /// Object member order is irrelevant; numbers compare by value when
    /// both literals parse, by literal text otherwise.
    pub fn is_equivalent_to(&self, other: &JsonNode) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(name, node)| b.get(name).is_some_and(|o| node.is_equivalent_to(o)))
            }
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_equivalent_to(y))
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => match (parse_integer(a), parse_integer(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            (Self::Number(a), Self::Number(b)) => match (parse_number(a), parse_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Null, Self::Null) => true,
            _ => false,
        }
    }

    /// Convert back into a `serde_json` value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Object(members) => Value::Object(
                members
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_value()))
                    .collect(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
            Self::String(s) => Value::String(s.clone()),
            Self::Number(raw) | Self::Integer(raw) => raw
                .parse::<serde_json::Number>()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(raw.clone())),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Null => Value::Null,
        }
    }
}

/// A number literal converted for comparison.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum NumberValue {
    Decimal(Decimal),
    /// Finite, but outside the range of [`Decimal`].
    Float(f64),
}

/// Parse an integral literal.
pub(crate) fn parse_integer(raw: &str) -> Option<i128> {
    raw.parse::<i128>().ok()
}

/// Parse a number literal, plain (`2.30`) or scientific (`1e-3`).
pub(crate) fn parse_number(raw: &str) -> Option<NumberValue> {
    if let Ok(value) = raw.parse::<Decimal>() {
        return Some(NumberValue::Decimal(value));
    }
    if let Ok(value) = Decimal::from_scientific(raw) {
        return Some(NumberValue::Decimal(value));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(NumberValue::Float)
}

impl From<Value> for JsonNode {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Strings render raw; every other node renders as pretty-printed JSON.
impl fmt::Display for JsonNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(raw) | Self::Integer(raw) => f.write_str(raw),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            Self::Object(_) | Self::Array(_) => {
                let text = serde_json::to_string_pretty(&self.to_value()).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
        }
    }
}
