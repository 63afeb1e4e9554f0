//! JSON tree diff: compare an actual and an expected [`JsonNode`].
//!
//! The comparison walks both trees together, threading the current
//! [`JsonPath`]. Objects reconcile members by name, arrays are compared
//! positionally but re-matched when elements were moved, repeated, added,
//! or removed, and scalars compare by value in their own domain.
//!
//! Exclusions only suppress reporting. Array re-matching always sees the
//! whole array.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, trace};

use reqspy_types::{ComparisonOptions, ComparisonResult, Difference, JsonPath, TypeError};

use crate::error::DiffResult;
use crate::json_node::{parse_integer, parse_number, JsonNode, SchemaType};

/// Compare two JSON trees.
///
/// Pure and deterministic: the same inputs always yield the same
/// differences in the same order.
pub fn compare_json(
    actual: &JsonNode,
    expected: &JsonNode,
    options: &ComparisonOptions,
) -> ComparisonResult {
    let path = JsonPath::root();
    let result = JsonComparer { options }.compare_nodes(Some(actual), Some(expected), &path);
    debug!(root = %path, differences = result.len(), "json comparison finished");
    result
}

/// Compare two JSON trees, configuring default options with `configure`.
pub fn compare_json_with<F>(
    actual: &JsonNode,
    expected: &JsonNode,
    configure: F,
) -> DiffResult<ComparisonResult>
where
    F: FnOnce(ComparisonOptions) -> Result<ComparisonOptions, TypeError>,
{
    let options = configure(ComparisonOptions::default())?;
    Ok(compare_json(actual, expected, &options))
}

/// Serialize both values as JSON and compare the resulting trees.
pub fn compare_serialized_as_json<A, E, F>(
    actual: &A,
    expected: &E,
    configure: F,
) -> DiffResult<ComparisonResult>
where
    A: Serialize + ?Sized,
    E: Serialize + ?Sized,
    F: FnOnce(ComparisonOptions) -> Result<ComparisonOptions, TypeError>,
{
    let actual = JsonNode::from_serializable(actual)?;
    let expected = JsonNode::from_serializable(expected)?;
    compare_json_with(&actual, &expected, configure)
}

struct JsonComparer<'o> {
    options: &'o ComparisonOptions,
}

impl JsonComparer<'_> {
    /// `None` stands for an object member that is absent or `null`.
    fn compare_nodes(
        &self,
        actual: Option<&JsonNode>,
        expected: Option<&JsonNode>,
        path: &JsonPath,
    ) -> ComparisonResult {
        if self.options.is_excluded(path) {
            return ComparisonResult::empty();
        }

        let (actual, expected) = match (actual, expected) {
            (None, None) => return ComparisonResult::empty(),
            (None, Some(expected)) => {
                return Difference::new(format!("Missing {path}: {expected}")).into();
            }
            (Some(actual), None) => {
                return Difference::new(format!("Unexpected {path}: {actual}")).into();
            }
            (Some(actual), Some(expected)) => (actual, expected),
        };

        let actual_type = actual.schema_type();
        let expected_type = expected.schema_type();
        if actual_type != expected_type {
            return Difference::with_values(
                format!("Invalid type at {path}"),
                expected_type.to_string(),
                actual_type.to_string(),
            )
            .into();
        }

        match (actual, expected) {
            (JsonNode::Object(a), JsonNode::Object(e)) => self.compare_objects(a, e, path),
            (JsonNode::Array(a), JsonNode::Array(e)) => self.compare_arrays(a, e, path),
            (JsonNode::Boolean(a), JsonNode::Boolean(e)) => compare_values(a, e, path),
            (JsonNode::Integer(a), JsonNode::Integer(e)) => {
                compare_scalars(a, e, path, SchemaType::Integer, parse_integer)
            }
            (JsonNode::Number(a), JsonNode::Number(e)) => {
                compare_scalars(a, e, path, SchemaType::Number, parse_number)
            }
            (JsonNode::String(a), JsonNode::String(e)) => compare_text(a, e, path),
            (JsonNode::Null, JsonNode::Null) => ComparisonResult::empty(),
            // Mismatched variants were rejected by the type check above.
            _ => ComparisonResult::empty(),
        }
    }

    fn compare_objects(
        &self,
        actual_members: &IndexMap<String, JsonNode>,
        expected_members: &IndexMap<String, JsonNode>,
        path: &JsonPath,
    ) -> ComparisonResult {
        let mut result = ComparisonResult::empty();

        for (name, expected_member) in expected_members {
            let member_path = path.property(name);
            let expected_member = present(expected_member);

            match actual_members.get(name).and_then(present) {
                None => {
                    if expected_member.is_some() && !self.options.is_excluded(&member_path) {
                        result +=
                            Difference::new(format!("Missing property {member_path}"));
                    }
                }
                Some(actual_member) => {
                    result +=
                        self.compare_nodes(Some(actual_member), expected_member, &member_path);
                }
            }
        }

        // Every member named in `expected` was reconciled above.
        for (name, actual_member) in actual_members {
            if expected_members.contains_key(name) {
                continue;
            }
            let member_path = path.property(name);
            if present(actual_member).is_some() && !self.options.is_excluded(&member_path) {
                result += Difference::new(format!("Unexpected property {member_path}"));
            }
        }

        result
    }

    fn compare_arrays(
        &self,
        actual: &[JsonNode],
        expected: &[JsonNode],
        path: &JsonPath,
    ) -> ComparisonResult {
        let mut result = ComparisonResult::empty();
        let mut matched = vec![false; actual.len()];

        for (index, expected_element) in expected.iter().enumerate() {
            let element_path = path.index(index);

            let Some(same_position) = actual.get(index) else {
                if !self.options.is_excluded(&element_path) {
                    result += Difference::new(format!(
                        "Missing Element {element_path} : {expected_element}"
                    ));
                }
                continue;
            };

            if same_position.is_equivalent_to(expected_element) {
                matched[index] = true;
                continue;
            }

            let equivalents: Vec<usize> = actual
                .iter()
                .enumerate()
                .filter(|(_, candidate)| candidate.is_equivalent_to(expected_element))
                .map(|(position, _)| position)
                .collect();

            match equivalents.as_slice() {
                [] => {
                    matched[index] = true;
                    result += self.compare_nodes(
                        Some(same_position),
                        Some(expected_element),
                        &element_path,
                    );
                }
                [moved_to] => {
                    matched[*moved_to] = true;
                    let moved_path = path.index(*moved_to);
                    trace!(from = %element_path, to = %moved_path, "array element moved");
                    if !self.options.is_excluded(&element_path) {
                        result += Difference::new(format!(
                            "Element {element_path} was moved to {moved_path}"
                        ));
                    }
                }
                repeated => {
                    for position in repeated {
                        matched[*position] = true;
                    }
                    trace!(
                        element = %element_path,
                        count = repeated.len(),
                        "array element matched repeatedly"
                    );
                    if !self.options.is_excluded(&element_path) {
                        let positions = repeated
                            .iter()
                            .map(|position| path.index(*position).to_string())
                            .collect::<Vec<_>>()
                            .join(", ");
                        result += Difference::new(format!(
                            "Element {element_path} was added {} times: {positions}",
                            repeated.len()
                        ));
                    }
                }
            }
        }

        for (index, actual_element) in actual.iter().enumerate() {
            if matched[index] {
                continue;
            }
            let element_path = path.index(index);
            if !self.options.is_excluded(&element_path) {
                result += Difference::new(format!(
                    "Unexpected Element {element_path} : {actual_element}"
                ));
            }
        }

        result
    }
}

/// Object members holding `null` count as absent.
fn present(node: &JsonNode) -> Option<&JsonNode> {
    (!node.is_null()).then_some(node)
}

fn compare_values<T: PartialEq + ToString>(
    actual: &T,
    expected: &T,
    path: &JsonPath,
) -> ComparisonResult {
    if actual == expected {
        return ComparisonResult::empty();
    }
    values_differ(&expected.to_string(), &actual.to_string(), path)
}

/// Compare two number literals after converting them with `parse`.
fn compare_scalars<T, P>(
    actual: &str,
    expected: &str,
    path: &JsonPath,
    schema_type: SchemaType,
    parse: P,
) -> ComparisonResult
where
    T: PartialEq,
    P: Fn(&str) -> Option<T>,
{
    let Some(actual_value) = parse(actual) else {
        return conversion_failed(actual, path, schema_type);
    };
    let Some(expected_value) = parse(expected) else {
        return conversion_failed(expected, path, schema_type);
    };

    if actual_value == expected_value {
        return ComparisonResult::empty();
    }
    values_differ(expected, actual, path)
}

/// Strings compare with carriage returns removed, so CRLF and LF line
/// endings are equivalent.
fn compare_text(actual: &str, expected: &str, path: &JsonPath) -> ComparisonResult {
    let actual = actual.replace('\r', "");
    let expected = expected.replace('\r', "");
    if actual == expected {
        return ComparisonResult::empty();
    }
    values_differ(&expected, &actual, path)
}

fn conversion_failed(raw: &str, path: &JsonPath, schema_type: SchemaType) -> ComparisonResult {
    Difference::new(format!("Could not convert value '{raw}' at {path} to {schema_type}")).into()
}

fn values_differ(expected: &str, actual: &str, path: &JsonPath) -> ComparisonResult {
    Difference::with_values(
        format!("Values are different at {path}"),
        with_visible_blanks(expected),
        with_visible_blanks(actual),
    )
    .into()
}

/// Make whitespace visible in rendered values.
fn with_visible_blanks(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            ' ' => output.push('·'),
            '\t' => output.push_str("\\t"),
            '\r' => output.push_str("\\r"),
            '\n' => output.push_str("\\n\n"),
            other => output.push(other),
        }
    }
    output
}
