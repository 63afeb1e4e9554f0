//! XML tree diff: compare an actual and an expected [`XmlElement`].
//!
//! Elements are matched by local name. Children are grouped by name: a
//! name that occurs once recurses directly at `{path}/name`, a repeated
//! name is compared position by position at `{path}/name[k]`. Unlike JSON
//! arrays, repeated groups are never re-matched.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use reqspy_types::{ComparisonOptions, ComparisonResult, Difference, TypeError, XmlPath};

use crate::error::DiffResult;
use crate::xml_node::{local_part, XmlElement};

/// Compare two XML documents, starting at the options' root path (or the
/// document element). Reported paths are relative to the document element.
pub fn compare_xml(
    actual: Option<&XmlElement>,
    expected: Option<&XmlElement>,
    options: &ComparisonOptions,
) -> ComparisonResult {
    let root = options.root_path().cloned().unwrap_or_default();
    let actual = actual.and_then(|document| document.find(&root));
    let expected = expected.and_then(|document| document.find(&root));

    let result = XmlComparer { options }.compare_elements(actual, expected, &root);
    debug!(root = %root, differences = result.len(), "xml comparison finished");
    result
}

/// Compare two XML documents, configuring default options with `configure`.
pub fn compare_xml_with<F>(
    actual: Option<&XmlElement>,
    expected: Option<&XmlElement>,
    configure: F,
) -> DiffResult<ComparisonResult>
where
    F: FnOnce(ComparisonOptions) -> Result<ComparisonOptions, TypeError>,
{
    let options = configure(ComparisonOptions::default())?;
    Ok(compare_xml(actual, expected, &options))
}

/// Serialize both values with `quick_xml::se` and compare the documents.
pub fn compare_serialized_as_xml<A, E, F>(
    actual: &A,
    expected: &E,
    configure: F,
) -> DiffResult<ComparisonResult>
where
    A: Serialize + ?Sized,
    E: Serialize + ?Sized,
    F: FnOnce(ComparisonOptions) -> Result<ComparisonOptions, TypeError>,
{
    let actual = XmlElement::from_serializable(actual)?;
    let expected = XmlElement::from_serializable(expected)?;
    compare_xml_with(Some(&actual), Some(&expected), configure)
}

struct XmlComparer<'o> {
    options: &'o ComparisonOptions,
}

impl XmlComparer<'_> {
    fn compare_elements(
        &self,
        actual: Option<&XmlElement>,
        expected: Option<&XmlElement>,
        path: &XmlPath,
    ) -> ComparisonResult {
        if self.options.is_excluded(path) {
            return ComparisonResult::empty();
        }

        let (actual, expected) = match (actual, expected) {
            (None, None) => return ComparisonResult::empty(),
            (None, Some(_)) => {
                return Difference::new(format!("Actual element at {path} is null")).into();
            }
            (Some(_), None) => {
                return Difference::new(format!("Expected element at {path} is null")).into();
            }
            (Some(actual), Some(expected)) => (actual, expected),
        };

        let mut result = ComparisonResult::empty();

        if actual.local_name() != expected.local_name() {
            result += Difference::with_values(
                format!("Names are different at {path}"),
                expected.local_name(),
                actual.local_name(),
            );
        }

        result += self.compare_attributes(actual, expected, path);

        if actual.is_leaf() && expected.is_leaf() && actual.text != expected.text {
            result += Difference::with_values(
                format!("Values are different at {path}"),
                expected.text.as_str(),
                actual.text.as_str(),
            );
        }

        result += self.compare_children(actual, expected, path);
        result
    }

    fn compare_attributes(
        &self,
        actual: &XmlElement,
        expected: &XmlElement,
        path: &XmlPath,
    ) -> ComparisonResult {
        let mut result = ComparisonResult::empty();

        for (name, actual_value) in &actual.attributes {
            let attribute_path = path.attribute(name);
            if self.options.is_excluded(&attribute_path) {
                continue;
            }
            match expected.attributes.get(name) {
                None => {
                    result += Difference::new(format!("Unexpected attribute at {attribute_path}"));
                }
                Some(expected_value) if expected_value != actual_value => {
                    result += Difference::with_values(
                        format!("Values are different at {attribute_path}"),
                        expected_value.as_str(),
                        actual_value.as_str(),
                    );
                }
                Some(_) => {}
            }
        }

        for name in expected.attributes.keys() {
            if actual.attributes.contains_key(name)
                || self.options.is_excluded(&path.attribute(name))
            {
                continue;
            }
            result +=
                Difference::new(format!("Missing attribute {} at {path}", local_part(name)));
        }

        result
    }

    fn compare_children(
        &self,
        actual: &XmlElement,
        expected: &XmlElement,
        path: &XmlPath,
    ) -> ComparisonResult {
        let mut result = ComparisonResult::empty();
        let actual_groups = group_by_name(&actual.children);
        let expected_groups = group_by_name(&expected.children);

        for (name, group) in &actual_groups {
            let expected_group = expected_groups.get(name).map(Vec::as_slice).unwrap_or_default();

            if let [single] = group.as_slice() {
                let child_path = path.element(name);
                match expected_group.first() {
                    Some(expected_child) => {
                        result += self.compare_elements(
                            Some(*single),
                            Some(*expected_child),
                            &child_path,
                        );
                    }
                    None if !self.options.is_excluded(&child_path) => {
                        result += Difference::new(format!("Unexpected element at {child_path}"));
                    }
                    None => {}
                }
            } else {
                for (offset, actual_child) in group.iter().enumerate() {
                    let child_path = path.indexed(name, offset + 1);
                    match expected_group.get(offset) {
                        Some(expected_child) => {
                            result += self.compare_elements(
                                Some(*actual_child),
                                Some(*expected_child),
                                &child_path,
                            );
                        }
                        None if !self.options.is_excluded(&child_path) => {
                            result +=
                                Difference::new(format!("Unexpected element at {child_path}"));
                        }
                        None => {}
                    }
                }
            }

            result += self.missing_values(name, group.len(), expected_group.len(), path);
        }

        for (name, group) in &expected_groups {
            if actual_groups.contains_key(name) {
                continue;
            }
            if group.len() == 1 {
                if !self.options.is_excluded(&path.element(name)) {
                    result += Difference::new(format!("Missing element {name} at {path}"));
                }
            } else {
                result += self.missing_values(name, 0, group.len(), path);
            }
        }

        result
    }

    /// Report expected positions of a repeated group past the actual count.
    fn missing_values(
        &self,
        name: &str,
        actual_count: usize,
        expected_count: usize,
        path: &XmlPath,
    ) -> ComparisonResult {
        (actual_count + 1..=expected_count)
            .map(|position| path.indexed(name, position))
            .filter(|child_path| !self.options.is_excluded(child_path))
            .map(|child_path| Difference::new(format!("Missing value at {child_path}")))
            .collect()
    }
}

/// Children grouped by local name, in order of first occurrence.
fn group_by_name(children: &[XmlElement]) -> IndexMap<&str, Vec<&XmlElement>> {
    let mut groups: IndexMap<&str, Vec<&XmlElement>> = IndexMap::new();
    for child in children {
        groups.entry(child.local_name()).or_default().push(child);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(text: &str) -> XmlElement {
        XmlElement::parse(text).unwrap()
    }

    fn compare(actual: &str, expected: &str) -> ComparisonResult {
        compare_xml(Some(&parse(actual)), Some(&parse(expected)), &ComparisonOptions::default())
    }

    const RECORD: &str = r#"
        <Record flag="true">
            <Text>Lorem Ipsum</Text>
            <Count>32</Count>
            <Items>
                <Item><Label>Item1</Label></Item>
                <Item><Label>Item2</Label></Item>
            </Items>
        </Record>"#;

    #[test]
    fn equivalent_documents_have_no_differences() {
        assert!(compare(RECORD, RECORD).is_empty());
    }

    #[test]
    fn leaf_mismatches_report_expected_and_actual() {
        let result = compare(
            "<Root><Prop1>1</Prop1><Prop2>2</Prop2><SubProp><Value>3</Value></SubProp></Root>",
            "<Root><Prop1>3</Prop1><Prop2>2</Prop2><SubProp><Value>4</Value></SubProp></Root>",
        );
        assert_eq!(
            result.differences(),
            &[
                Difference::with_values("Values are different at /Prop1", "3", "1"),
                Difference::with_values("Values are different at /SubProp/Value", "4", "3"),
            ]
        );
    }

    #[test]
    fn unexpected_elements_follow_document_order() {
        let result = compare(
            "<Root><Prop1>1</Prop1><Prop2>2</Prop2><SubProp><Value>2.3</Value></SubProp></Root>",
            "<Root><Prop1>1</Prop1><SubProp/></Root>",
        );
        assert_eq!(
            result.messages(),
            vec!["Unexpected element at /Prop2", "Unexpected element at /SubProp/Value"]
        );
    }

    #[test]
    fn missing_elements_are_reported_after_recursion() {
        let result = compare(
            "<Root><Prop1>1</Prop1><SubProp/></Root>",
            "<Root><Prop1>1</Prop1><Prop2>2</Prop2><SubProp><Value>2.3</Value></SubProp></Root>",
        );
        assert_eq!(
            result.messages(),
            vec!["Missing element Value at /SubProp", "Missing element Prop2 at /"]
        );
    }

    #[test]
    fn repeated_groups_compare_by_position() {
        let ints = |values: &[u8]| {
            let items: String = values.iter().map(|v| format!("<int>{v}</int>")).collect();
            format!("<ArrayOfInt>{items}</ArrayOfInt>")
        };
        let result = compare(&ints(&[0, 1, 4, 5]), &ints(&[0, 1, 2, 3, 4]));
        assert_eq!(
            result.differences(),
            &[
                Difference::with_values("Values are different at /int[3]", "2", "4"),
                Difference::with_values("Values are different at /int[4]", "3", "5"),
                Difference::new("Missing value at /int[5]"),
            ]
        );
    }

    #[test]
    fn extra_repeated_elements_are_unexpected() {
        let result = compare("<a><b>1</b><b>2</b><b>3</b></a>", "<a><b>1</b><b>2</b></a>");
        assert_eq!(result.messages(), vec!["Unexpected element at /b[3]"]);
    }

    #[test]
    fn single_actual_against_repeated_expected() {
        let result = compare("<a><b>1</b></a>", "<a><b>1</b><b>2</b><b>3</b></a>");
        assert_eq!(result.messages(), vec!["Missing value at /b[2]", "Missing value at /b[3]"]);
    }

    #[test]
    fn repeated_group_only_in_expected() {
        let result = compare("<a/>", "<a><b>1</b><b>2</b></a>");
        assert_eq!(result.messages(), vec!["Missing value at /b[1]", "Missing value at /b[2]"]);
    }

    #[test]
    fn attribute_text_and_nested_differences() {
        let expected = RECORD
            .replace(r#"flag="true""#, r#"flag="false""#)
            .replace("Lorem Ipsum", "Dolor")
            .replace("Item1", "Item1.5");
        let result = compare(RECORD, &expected);
        assert_eq!(
            result.differences(),
            &[
                Difference::with_values("Values are different at /@flag", "false", "true"),
                Difference::with_values("Values are different at /Text", "Dolor", "Lorem Ipsum"),
                Difference::with_values(
                    "Values are different at /Items/Item[1]/Label",
                    "Item1.5",
                    "Item1"
                ),
            ]
        );
    }

    #[test]
    fn exclusions_suppress_attribute_and_element_paths() {
        let actual = RECORD
            .replace(r#"flag="true""#, r#"flag="false""#)
            .replace("Lorem Ipsum", "Alea jacta est");
        let result = compare_xml_with(Some(&parse(&actual)), Some(&parse(RECORD)), |o| {
            o.exclude(["@flag", "/Text"])
        })
        .unwrap();
        assert!(result.is_empty(), "unexpected differences:\n{result}");
    }

    #[test]
    fn attribute_presence_is_reconciled() {
        let result = compare(r#"<a x="1" y="2"/>"#, r#"<a y="2" p:z="3" xmlns:p="urn:p"/>"#);
        assert_eq!(
            result.messages(),
            vec!["Unexpected attribute at /@x", "Missing attribute z at /"]
        );
    }

    #[test]
    fn excluded_attributes_are_not_missing() {
        let result = compare_xml_with(
            Some(&parse("<a/>")),
            Some(&parse(r#"<a id="1"/>"#)),
            |o| o.exclude(["@id"]),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn names_compare_by_local_name() {
        let result = compare(
            r#"<p:a xmlns:p="urn:x"><p:b>1</p:b></p:a>"#,
            "<a><b>1</b></a>",
        );
        assert!(result.is_empty(), "unexpected differences:\n{result}");
    }

    #[test]
    fn root_name_mismatch_does_not_stop_recursion() {
        let result = compare("<a><c>1</c></a>", "<b><c>2</c></b>");
        assert_eq!(
            result.differences(),
            &[
                Difference::with_values("Names are different at /", "b", "a"),
                Difference::with_values("Values are different at /c", "2", "1"),
            ]
        );
    }

    #[test]
    fn text_of_non_leaves_is_ignored() {
        assert!(compare("<a>x<b>1</b></a>", "<a>y<b>1</b></a>").is_empty());
        assert_eq!(compare("<a>x</a>", "<a><b/></a>").messages(), vec!["Missing element b at /"]);
    }

    #[test]
    fn absent_documents() {
        let doc = parse("<a/>");
        let options = ComparisonOptions::default();
        assert!(compare_xml(None, None, &options).is_empty());
        assert_eq!(
            compare_xml(None, Some(&doc), &options).messages(),
            vec!["Actual element at / is null"]
        );
        assert_eq!(
            compare_xml(Some(&doc), None, &options).messages(),
            vec!["Expected element at / is null"]
        );
    }

    #[test]
    fn root_path_targets_a_fragment() {
        let actual = parse(
            r#"<Envelope><Header>a</Header><Body><Order><Id>1</Id></Order></Body></Envelope>"#,
        );
        let expected = parse(
            r#"<Envelope><Header>b</Header><Body><Order><Id>2</Id></Order></Body></Envelope>"#,
        );
        let result = compare_xml_with(Some(&actual), Some(&expected), |o| {
            o.with_root_path("Body/Order")
        })
        .unwrap();
        assert_eq!(
            result.differences(),
            &[Difference::with_values("Values are different at /Body/Order/Id", "2", "1")]
        );

        let bare = parse("<Envelope><Body/></Envelope>");
        let result = compare_xml_with(Some(&bare), Some(&expected), |o| {
            o.with_root_path("/Body/Order/")
        })
        .unwrap();
        assert_eq!(result.messages(), vec!["Actual element at /Body/Order is null"]);
    }

    #[test]
    fn serialized_values_compare_as_xml() {
        #[derive(Serialize)]
        struct Record {
            #[serde(rename = "@flag")]
            flag: bool,
            #[serde(rename = "Text")]
            text: &'static str,
            #[serde(rename = "Count")]
            count: u32,
        }
        let actual = Record { flag: true, text: "Lorem Ipsum", count: 32 };
        let expected = Record { flag: false, text: "Lorem Ipsum", count: 31 };

        let result = compare_serialized_as_xml(&actual, &expected, Ok).unwrap();
        assert_eq!(
            result.differences(),
            &[
                Difference::with_values("Values are different at /@flag", "false", "true"),
                Difference::with_values("Values are different at /Count", "31", "32"),
            ]
        );

        let result =
            compare_serialized_as_xml(&actual, &expected, |o| o.exclude(["@flag", "Count"]))
                .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn malformed_configuration_fails_before_comparing() {
        let doc = parse("<a/>");
        assert!(compare_xml_with(Some(&doc), Some(&doc), |o| o.with_root_path("a[0]")).is_err());
    }

    // ---------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------

    fn arb_element() -> impl Strategy<Value = XmlElement> {
        let leaf = ("[ab]", "[xy ]{0,2}", prop::collection::vec(("[pq]", "[01]"), 0..3)).prop_map(
            |(name, text, attributes)| {
                attributes
                    .into_iter()
                    .fold(XmlElement::new(name).with_text(text), |e, (k, v)| e.with_attribute(k, v))
            },
        );
        leaf.prop_recursive(3, 16, 4, |inner| {
            ("[ab]", prop::collection::vec(inner, 0..4))
                .prop_map(|(name, children)| XmlElement { name, children, ..XmlElement::default() })
        })
    }

    proptest! {
        #[test]
        fn comparing_a_document_with_itself_is_empty(doc in arb_element()) {
            let options = ComparisonOptions::default();
            prop_assert!(compare_xml(Some(&doc), Some(&doc), &options).is_empty());
        }

        #[test]
        fn comparison_is_idempotent(a in arb_element(), b in arb_element()) {
            let options = ComparisonOptions::default();
            prop_assert_eq!(
                compare_xml(Some(&a), Some(&b), &options),
                compare_xml(Some(&a), Some(&b), &options)
            );
        }

        #[test]
        fn exclusions_only_remove_differences(
            a in arb_element(),
            b in arb_element(),
            pattern in prop_oneof![Just("/a"), Just("@p"), Just("b[2]"), Just("/*/b")],
        ) {
            let all = compare_xml(Some(&a), Some(&b), &ComparisonOptions::default());
            let options = ComparisonOptions::default().exclude([pattern]).unwrap();
            let some = compare_xml(Some(&a), Some(&b), &options);
            for difference in &some {
                prop_assert!(all.differences().contains(difference));
            }
        }
    }
}
