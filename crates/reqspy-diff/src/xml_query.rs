//! Element queries: locate elements or attribute values in a document by
//! slash path, e.g. `/Order/Lines/Line[2]/@sku`.
//!
//! Queries run in one of two modes:
//!
//! - **local-name** ([`ElementQuery::new`]): prefixes written on steps are
//!   ignored and every step matches by local name.
//! - **namespace-aware** ([`ElementQuery::with_namespaces`]): a prefixed step
//!   `p:Name` matches elements in the namespace bound to `p` by the
//!   document's own `xmlns:p` declarations; an unprefixed step matches
//!   elements in no namespace.
//!
//! A step written `*[local-name()='Name']` matches by local name in either
//! mode.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{DiffError, DiffResult};
use crate::xml_node::{local_part, XmlElement};

// ---------------------------------------------------------------
// Namespace bindings
// ---------------------------------------------------------------

/// Prefix bindings collected from a document's namespace declarations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceMap {
    bindings: IndexMap<String, String>,
}

impl NamespaceMap {
    /// Collect every prefixed declaration on the document element and its
    /// descendants. Default-namespace declarations are skipped; a prefix
    /// declared twice keeps the later binding.
    pub fn from_document(document: &XmlElement) -> Self {
        let mut bindings = IndexMap::new();
        for element in document.descendants_and_self() {
            for (prefix, uri) in &element.namespaces {
                if prefix.trim().is_empty() {
                    continue;
                }
                bindings.insert(prefix.clone(), uri.clone());
            }
        }
        Self { bindings }
    }

    /// The URI bound to `prefix`.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// `(prefix, uri)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}

// ---------------------------------------------------------------
// Query
// ---------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
struct QueryStep {
    prefix: Option<String>,
    local: String,
    position: Option<usize>,
    attribute: bool,
    /// Written as `*[local-name()='...']`.
    local_only: bool,
}

impl QueryStep {
    fn parse(raw: &str, query: &str) -> DiffResult<Self> {
        if let Some(rest) = raw.strip_prefix("*[local-name()=") {
            let (quoted, tail) = rest
                .split_once(']')
                .ok_or_else(|| DiffError::query(query, format!("step {raw:?} is not closed")))?;
            let local = quoted.trim_matches(|c| c == '\'' || c == '"');
            if local.is_empty() {
                return Err(DiffError::query(query, format!("step {raw:?} has no name")));
            }
            return Ok(Self {
                prefix: None,
                local: local.to_string(),
                position: parse_position(tail, raw, query)?,
                attribute: false,
                local_only: true,
            });
        }

        let (attribute, raw_name) = match raw.strip_prefix('@') {
            Some(name) => (true, name),
            None => (false, raw),
        };
        let (name, position) = match raw_name.find('[') {
            Some(open) if !attribute => {
                let position = parse_position(&raw_name[open..], raw, query)?;
                (&raw_name[..open], position)
            }
            _ => (raw_name, None),
        };
        let (prefix, local) = match name.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), local),
            None => (None, name),
        };
        if local.is_empty() || prefix.as_deref() == Some("") {
            return Err(DiffError::query(query, format!("step {raw:?} has no name")));
        }

        Ok(Self {
            prefix,
            local: local.to_string(),
            position,
            attribute,
            local_only: false,
        })
    }

    fn pick<'d>(&self, siblings: &'d [XmlElement], filter: &NameFilter<'_>) -> Vec<&'d XmlElement> {
        let mut matching = siblings
            .iter()
            .filter(|e| e.local_name() == self.local && filter.accepts(e.namespace.as_deref()));
        match self.position {
            Some(position) => matching.nth(position - 1).into_iter().collect(),
            None => matching.collect(),
        }
    }
}

/// `""` (no position) or `"[k]"` with `k >= 1`.
fn parse_position(tail: &str, raw: &str, query: &str) -> DiffResult<Option<usize>> {
    if tail.is_empty() {
        return Ok(None);
    }
    tail.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|digits| digits.parse::<usize>().ok())
        .filter(|position| *position > 0)
        .map(Some)
        .ok_or_else(|| DiffError::query(query, format!("step {raw:?} has an invalid position")))
}

enum NameFilter<'n> {
    AnyNamespace,
    NoNamespace,
    Namespace(&'n str),
}

impl NameFilter<'_> {
    fn accepts(&self, namespace: Option<&str>) -> bool {
        match self {
            Self::AnyNamespace => true,
            Self::NoNamespace => namespace.is_none(),
            Self::Namespace(uri) => namespace == Some(*uri),
        }
    }
}

/// One node selected by an [`ElementQuery`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryMatch<'d> {
    Element(&'d XmlElement),
    Attribute {
        element: &'d XmlElement,
        name: &'d str,
        value: &'d str,
    },
}

impl QueryMatch<'_> {
    /// Text of the selected element, or the attribute value.
    pub fn value(&self) -> String {
        match self {
            Self::Element(element) => element.value(),
            Self::Attribute { value, .. } => (*value).to_string(),
        }
    }
}

/// A parsed slash-path query over an [`XmlElement`] document.
///
/// The first step matches the document element itself. Each further step
/// selects the matching children of every element selected so far, or
/// only the `k`-th (1-based) matching child of each when written `[k]`.
/// A final `@name` step selects attribute values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementQuery {
    raw: String,
    steps: Vec<QueryStep>,
    checks_namespaces: bool,
}

impl ElementQuery {
    /// A local-name query.
    pub fn new(query: &str) -> DiffResult<Self> {
        Self::parse(query, false)
    }

    /// A namespace-aware query.
    pub fn with_namespaces(query: &str) -> DiffResult<Self> {
        Self::parse(query, true)
    }

    fn parse(query: &str, checks_namespaces: bool) -> DiffResult<Self> {
        let steps = query
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|raw| QueryStep::parse(raw, query))
            .collect::<DiffResult<Vec<_>>>()?;

        if steps.is_empty() {
            return Err(DiffError::query(query, "query has no steps"));
        }
        if steps[..steps.len() - 1].iter().any(|s| s.attribute) {
            return Err(DiffError::query(query, "an attribute step must be the last step"));
        }

        Ok(Self {
            raw: query.to_string(),
            steps,
            checks_namespaces,
        })
    }

    /// Name of the element or attribute the last step selects, as written.
    pub fn property_name(&self) -> String {
        self.steps
            .last()
            .map(|step| match &step.prefix {
                Some(prefix) if !step.local_only => format!("{prefix}:{}", step.local),
                _ => step.local.clone(),
            })
            .unwrap_or_default()
    }

    /// Returns `true` if the query selects attribute values.
    pub fn targets_attribute(&self) -> bool {
        self.steps.last().is_some_and(|step| step.attribute)
    }

    pub fn checks_namespaces(&self) -> bool {
        self.checks_namespaces
    }

    /// Returns `true` if every step of `prefix` opens this query.
    pub fn starts_with(&self, prefix: &ElementQuery) -> bool {
        self.checks_namespaces == prefix.checks_namespaces && self.steps.starts_with(&prefix.steps)
    }

    /// Append `other`'s steps to this query. Both queries must use the
    /// same mode.
    pub fn join(&self, other: &ElementQuery) -> DiffResult<Self> {
        let joined = format!(
            "{}/{}",
            self.raw.trim_end_matches('/'),
            other.raw.trim_start_matches('/')
        );
        if self.checks_namespaces != other.checks_namespaces {
            return Err(DiffError::query(
                joined,
                "cannot join a namespace-aware query with a local-name query",
            ));
        }
        Self::parse(&joined, self.checks_namespaces)
    }

    /// Evaluate the query against `document`, in document order.
    pub fn select<'d>(&self, document: &'d XmlElement) -> DiffResult<Vec<QueryMatch<'d>>> {
        let namespaces = self
            .checks_namespaces
            .then(|| NamespaceMap::from_document(document));
        let filters = self
            .steps
            .iter()
            .map(|step| self.filter_for(step, namespaces.as_ref()))
            .collect::<DiffResult<Vec<_>>>()?;

        let mut selected: Vec<&'d XmlElement> = Vec::new();
        for (index, (step, filter)) in self.steps.iter().zip(&filters).enumerate() {
            if step.attribute {
                return Ok(select_attributes(&selected, step, filter, namespaces.as_ref()));
            }
            let sibling_sets: Vec<&'d [XmlElement]> = if index == 0 {
                vec![std::slice::from_ref(document)]
            } else {
                selected.iter().map(|&e| e.children.as_slice()).collect()
            };
            selected = sibling_sets
                .into_iter()
                .flat_map(|siblings| step.pick(siblings, filter))
                .collect();
        }

        Ok(selected.into_iter().map(QueryMatch::Element).collect())
    }

    fn filter_for<'n>(
        &self,
        step: &QueryStep,
        namespaces: Option<&'n NamespaceMap>,
    ) -> DiffResult<NameFilter<'n>> {
        let Some(namespaces) = namespaces else {
            return Ok(NameFilter::AnyNamespace);
        };
        if step.local_only {
            return Ok(NameFilter::AnyNamespace);
        }
        match &step.prefix {
            None => Ok(NameFilter::NoNamespace),
            Some(prefix) => namespaces.resolve(prefix).map(NameFilter::Namespace).ok_or_else(|| {
                DiffError::query(
                    &self.raw,
                    format!("namespace prefix {prefix:?} is not declared in the document"),
                )
            }),
        }
    }
}

fn select_attributes<'d>(
    elements: &[&'d XmlElement],
    step: &QueryStep,
    filter: &NameFilter<'_>,
    namespaces: Option<&NamespaceMap>,
) -> Vec<QueryMatch<'d>> {
    let mut matches = Vec::new();
    for &element in elements {
        for (name, value) in &element.attributes {
            let namespace = name
                .split_once(':')
                .and_then(|(prefix, _)| namespaces.and_then(|m| m.resolve(prefix)));
            if local_part(name) == step.local && filter.accepts(namespace) {
                matches.push(QueryMatch::Attribute {
                    element,
                    name: name.as_str(),
                    value: value.as_str(),
                });
            }
        }
    }
    matches
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"
        <soap:Envelope xmlns:soap="urn:soap">
            <soap:Body>
                <o:Order xmlns:o="urn:orders" id="7" o:channel="web">
                    <o:Line sku="A">1</o:Line>
                    <o:Line sku="B">2</o:Line>
                </o:Order>
                <Note>plain</Note>
            </soap:Body>
        </soap:Envelope>"#;

    fn document() -> XmlElement {
        XmlElement::parse(ENVELOPE).unwrap()
    }

    fn values(query: &ElementQuery, document: &XmlElement) -> Vec<String> {
        query.select(document).unwrap().iter().map(QueryMatch::value).collect()
    }

    #[test]
    fn local_name_queries_ignore_prefixes() {
        let doc = document();
        let query = ElementQuery::new("/Envelope/Body/Order/Line").unwrap();
        assert_eq!(values(&query, &doc), vec!["1", "2"]);

        let prefixed = ElementQuery::new("/x:Envelope/y:Body/Order/Line[2]").unwrap();
        assert_eq!(values(&prefixed, &doc), vec!["2"]);
    }

    #[test]
    fn first_step_matches_the_document_element() {
        let doc = document();
        assert!(ElementQuery::new("/Body").unwrap().select(&doc).unwrap().is_empty());
        let root = ElementQuery::new("/Envelope").unwrap().select(&doc).unwrap();
        assert_eq!(root, vec![QueryMatch::Element(&doc)]);
    }

    #[test]
    fn attribute_steps_select_values() {
        let doc = document();
        let query = ElementQuery::new("Envelope/Body/Order/Line/@sku").unwrap();
        assert!(query.targets_attribute());
        assert_eq!(query.property_name(), "sku");
        assert_eq!(values(&query, &doc), vec!["A", "B"]);

        let channel = ElementQuery::new("/Envelope/Body/Order/@channel").unwrap();
        assert_eq!(values(&channel, &doc), vec!["web"]);
    }

    #[test]
    fn namespace_aware_queries_resolve_document_prefixes() {
        let doc = document();
        let query =
            ElementQuery::with_namespaces("/soap:Envelope/soap:Body/o:Order/o:Line[1]").unwrap();
        assert!(query.checks_namespaces());
        assert_eq!(values(&query, &doc), vec!["1"]);

        let note = ElementQuery::with_namespaces("/soap:Envelope/soap:Body/Note").unwrap();
        assert_eq!(values(&note, &doc), vec!["plain"]);

        let attribute =
            ElementQuery::with_namespaces("/soap:Envelope/soap:Body/o:Order/@o:channel")
                .unwrap();
        assert_eq!(values(&attribute, &doc), vec!["web"]);
    }

    #[test]
    fn unprefixed_steps_do_not_match_namespaced_elements() {
        let doc = document();
        let query = ElementQuery::with_namespaces("/Envelope").unwrap();
        assert!(query.select(&doc).unwrap().is_empty());
    }

    #[test]
    fn undeclared_prefix_is_a_query_error() {
        let doc = document();
        let query = ElementQuery::with_namespaces("/soap:Envelope/x:Body").unwrap();
        let err = query.select(&doc).unwrap_err();
        assert!(matches!(err, DiffError::Query { .. }));
    }

    #[test]
    fn local_name_steps_work_in_both_modes() {
        let doc = document();
        let raw = "/*[local-name()='Envelope']/*[local-name()=\"Body\"]/Note";
        assert_eq!(values(&ElementQuery::new(raw).unwrap(), &doc), vec!["plain"]);
        assert_eq!(values(&ElementQuery::with_namespaces(raw).unwrap(), &doc), vec!["plain"]);

        let line = ElementQuery::new("/Envelope/Body/Order/*[local-name()='Line'][2]").unwrap();
        assert_eq!(line.property_name(), "Line");
        assert_eq!(values(&line, &doc), vec!["2"]);
    }

    #[test]
    fn positions_apply_per_parent() {
        let doc = XmlElement::parse("<a><b><c>1</c><c>2</c></b><b><c>3</c></b></a>").unwrap();
        let query = ElementQuery::new("/a/b/c[1]").unwrap();
        assert_eq!(values(&query, &doc), vec!["1", "3"]);
    }

    #[test]
    fn malformed_queries_are_rejected() {
        for raw in ["", "/", "a/@b/c", "a[0]", "a[x]", "@", "p:", ":a", "*[local-name()='']"] {
            let err = ElementQuery::new(raw).unwrap_err();
            assert!(matches!(err, DiffError::Query { .. }), "{raw:?} gave {err:?}");
        }
    }

    #[test]
    fn join_concatenates_steps() {
        let order = ElementQuery::new("/Envelope/Body/Order/").unwrap();
        let line = ElementQuery::new("/Line[2]").unwrap();
        let joined = order.join(&line).unwrap();
        assert_eq!(joined.to_string(), "/Envelope/Body/Order/Line[2]");
        assert!(joined.starts_with(&order));
        assert!(!order.starts_with(&joined));
        assert_eq!(values(&joined, &document()), vec!["2"]);
    }

    #[test]
    fn join_rejects_mixed_modes() {
        let local = ElementQuery::new("/a").unwrap();
        let namespaced = ElementQuery::with_namespaces("/b").unwrap();
        assert!(matches!(local.join(&namespaced), Err(DiffError::Query { .. })));
    }

    #[test]
    fn namespace_map_collects_prefixed_declarations() {
        let doc = XmlElement::parse(
            r#"<a xmlns="urn:default" xmlns:p="urn:p"><b xmlns:q="urn:q"/></a>"#,
        )
        .unwrap();
        let map = NamespaceMap::from_document(&doc);
        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve("p"), Some("urn:p"));
        assert_eq!(map.resolve("q"), Some("urn:q"));
        assert_eq!(map.resolve(""), None);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("p", "urn:p"), ("q", "urn:q")]);
    }
}
