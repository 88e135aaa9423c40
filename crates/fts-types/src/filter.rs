//! Filter tree: the nested boolean where-expression of a record query.
//!
//! A [`Filter`] is one where-object, an ordered list of nodes. Each node is
//! either a combinator (`AND` / `OR` / `NOT` over child filters) or a leaf
//! mapping a field to a value. Leaf values that are objects are filters
//! themselves (predicate objects such as `{"contains": "x"}` or relation
//! filters), so combinators may appear at any depth.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::error::FtsError;

/// Logical combinator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinatorKind {
    And,
    Or,
    Not,
}

impl CombinatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombinatorKind::And => "AND",
            CombinatorKind::Or => "OR",
            CombinatorKind::Not => "NOT",
        }
    }

    /// Parse a where-object key, returning None for ordinary fields.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AND" => Some(CombinatorKind::And),
            "OR" => Some(CombinatorKind::Or),
            "NOT" => Some(CombinatorKind::Not),
            _ => None,
        }
    }
}

impl fmt::Display for CombinatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value held by a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Atomic list operand, e.g. the operand of `in`
    List(Vec<Value>),
    /// Predicate object or nested relation filter
    Object(Filter),
}

impl LeafValue {
    /// Convert a JSON value into a leaf value.
    pub fn from_json(value: &Value) -> Result<Self, FtsError> {
        Ok(match value {
            Value::Null => LeafValue::Null,
            Value::Bool(b) => LeafValue::Bool(*b),
            Value::Number(n) => LeafValue::Number(n.clone()),
            Value::String(s) => LeafValue::String(s.clone()),
            Value::Array(items) => LeafValue::List(items.clone()),
            Value::Object(_) => LeafValue::Object(Filter::from_json(value)?),
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            LeafValue::Null => Value::Null,
            LeafValue::Bool(b) => Value::Bool(*b),
            LeafValue::Number(n) => Value::Number(n.clone()),
            LeafValue::String(s) => Value::String(s.clone()),
            LeafValue::List(items) => Value::Array(items.clone()),
            LeafValue::Object(filter) => filter.to_json(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LeafValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for LeafValue {
    fn from(value: &str) -> Self {
        LeafValue::String(value.to_string())
    }
}

impl From<String> for LeafValue {
    fn from(value: String) -> Self {
        LeafValue::String(value)
    }
}

impl From<i64> for LeafValue {
    fn from(value: i64) -> Self {
        LeafValue::Number(value.into())
    }
}

impl From<bool> for LeafValue {
    fn from(value: bool) -> Self {
        LeafValue::Bool(value)
    }
}

impl From<Filter> for LeafValue {
    fn from(value: Filter) -> Self {
        LeafValue::Object(value)
    }
}

/// A field mapped to a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub field: String,
    pub value: LeafValue,
}

/// A logical combinator over child filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Combinator {
    pub kind: CombinatorKind,
    pub children: Vec<Filter>,
}

/// One entry of a where-object.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Combinator(Combinator),
    Leaf(Leaf),
}

impl FilterNode {
    pub fn leaf(field: impl Into<String>, value: impl Into<LeafValue>) -> Self {
        FilterNode::Leaf(Leaf {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn combinator(kind: CombinatorKind, children: Vec<Filter>) -> Self {
        FilterNode::Combinator(Combinator { kind, children })
    }
}

/// A where-object: an ordered list of filter nodes.
///
/// The empty filter is the empty tree and matches everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    pub nodes: Vec<FilterNode>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node.
    pub fn with(mut self, node: FilterNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parse a JSON where-object.
    ///
    /// Combinator operands may be a single object or an array of objects;
    /// both are normalized to a child sequence.
    pub fn from_json(value: &Value) -> Result<Self, FtsError> {
        let map = value
            .as_object()
            .ok_or_else(|| FtsError::InvalidFilter(format!("expected an object, got {value}")))?;

        let mut nodes = Vec::with_capacity(map.len());
        for (key, val) in map {
            if let Some(kind) = CombinatorKind::parse(key) {
                let children = match val {
                    Value::Array(items) => items
                        .iter()
                        .map(Filter::from_json)
                        .collect::<Result<Vec<_>, _>>()?,
                    Value::Object(_) => vec![Filter::from_json(val)?],
                    other => {
                        return Err(FtsError::InvalidFilter(format!(
                            "{kind} expects an object or an array of objects, got {other}"
                        )))
                    }
                };
                nodes.push(FilterNode::combinator(kind, children));
            } else {
                validate_field(key)?;
                nodes.push(FilterNode::Leaf(Leaf {
                    field: key.clone(),
                    value: LeafValue::from_json(val)?,
                }));
            }
        }

        Ok(Self { nodes })
    }

    /// Render as a JSON where-object. Combinators are always arrays.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for node in &self.nodes {
            match node {
                FilterNode::Combinator(c) => {
                    let children = c.children.iter().map(Filter::to_json).collect();
                    map.insert(c.kind.as_str().to_string(), Value::Array(children));
                }
                FilterNode::Leaf(leaf) => {
                    map.insert(leaf.field.clone(), leaf.value.to_json());
                }
            }
        }
        Value::Object(map)
    }
}

fn validate_field(field: &str) -> Result<(), FtsError> {
    if field.is_empty() {
        return Err(FtsError::InvalidFilter("empty field name".to_string()));
    }
    if field.contains('.') {
        return Err(FtsError::InvalidFilter(format!(
            "field name {field:?} must not contain '.'"
        )));
    }
    Ok(())
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Filter::from_json(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_leaf_and_combinator() {
        let filter = Filter::from_json(&json!({
            "AND": [{ "content": "fts:alpha" }, { "title": { "contains": "x" } }],
            "published": true
        }))
        .unwrap();

        assert_eq!(filter.nodes.len(), 2);
        match &filter.nodes[0] {
            FilterNode::Combinator(c) => {
                assert_eq!(c.kind, CombinatorKind::And);
                assert_eq!(c.children.len(), 2);
            }
            other => panic!("expected combinator, got {other:?}"),
        }
        assert_eq!(filter.nodes[1], FilterNode::leaf("published", true));
    }

    #[test]
    fn test_single_object_combinator_normalized() {
        let filter = Filter::from_json(&json!({ "NOT": { "title": null } })).unwrap();
        assert_eq!(filter.to_json(), json!({ "NOT": [{ "title": null }] }));
    }

    #[test]
    fn test_to_json_preserves_order() {
        let value = json!({ "b": 1, "a": { "in": [1, 2] }, "OR": [] });
        let filter = Filter::from_json(&value).unwrap();
        assert_eq!(filter.to_json(), value);
        let keys: Vec<_> = filter.to_json().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "OR"]);
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            Filter::from_json(&json!([1, 2])),
            Err(FtsError::InvalidFilter(_))
        ));
        assert!(matches!(
            Filter::from_json(&json!({ "AND": "x" })),
            Err(FtsError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_rejects_dotted_field() {
        let err = Filter::from_json(&json!({ "author.name": "x" })).unwrap_err();
        assert!(err.to_string().contains("author.name"));
    }

    #[test]
    fn test_builder() {
        let filter = Filter::new()
            .with(FilterNode::leaf("content", "fts:alpha"))
            .with(FilterNode::combinator(
                CombinatorKind::Or,
                vec![Filter::new().with(FilterNode::leaf("id", 1))],
            ));
        assert_eq!(
            filter.to_json(),
            json!({ "content": "fts:alpha", "OR": [{ "id": 1 }] })
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let filter: Filter = serde_json::from_value(json!({ "title": { "equals": "x" } })).unwrap();
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({ "title": { "equals": "x" } })
        );
    }
}
