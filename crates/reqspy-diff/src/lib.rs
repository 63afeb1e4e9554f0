//! Structural diff engine for reqspy.
//!
//! Compares an actual and an expected payload tree and reports an ordered,
//! human-readable list of differences. JSON arrays are re-matched so moved
//! and repeated elements are told apart from changed ones; XML repeated
//! elements are compared by position.
//!
//! # Key Types
//!
//! - [`JsonNode`] / [`SchemaType`] -- JSON tree model
//! - [`compare_json`] / [`compare_json_with`] / [`compare_serialized_as_json`] -- JSON differ
//! - [`XmlElement`] -- XML tree model, parsed with `quick-xml`
//! - [`compare_xml`] / [`compare_xml_with`] / [`compare_serialized_as_xml`] -- XML differ
//! - [`ElementQuery`] / [`NamespaceMap`] / [`QueryMatch`] -- Slash-path element lookup

pub mod error;
pub mod json_diff;
pub mod json_node;
pub mod xml_diff;
pub mod xml_node;
pub mod xml_query;

pub use error::{DiffError, DiffResult};
pub use json_diff::{compare_json, compare_json_with, compare_serialized_as_json};
pub use json_node::{JsonNode, SchemaType};
pub use xml_diff::{compare_serialized_as_xml, compare_xml, compare_xml_with};
pub use xml_node::XmlElement;
pub use xml_query::{ElementQuery, NamespaceMap, QueryMatch};

pub use reqspy_types::{ComparisonConfig, ComparisonOptions, ComparisonResult, Difference};
