//! Marker extraction.
//!
//! A marker is a leaf string of the form `fts:<query>` or
//! `fts:<query>{<json options>}`. Only leaves whose final path segment is a
//! bound column are considered.

use std::collections::HashSet;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use fts_types::{FtsError, MARKER_PREFIX};

use crate::codec::{last_segment, FlatFilter};

/// A marker split into its query text and provider options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSearch {
    pub query: String,
    pub options: Map<String, Value>,
}

impl RawSearch {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            options: Map::new(),
        }
    }
}

static OPTIONS_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Brace-delimited literal anchored at the end of the marker body.
fn options_pattern() -> &'static Regex {
    OPTIONS_PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}$").expect("options pattern is valid"))
}

/// Parse a leaf value as a marker.
///
/// Returns `Ok(None)` when the value does not carry the marker prefix. When
/// the body ends in a brace-delimited literal, the leftmost `{` whose suffix
/// parses as a JSON object starts the options; if none does, the marker is
/// rejected.
pub fn parse_marker(path: &str, value: &str) -> Result<Option<RawSearch>, FtsError> {
    let Some(body) = value.strip_prefix(MARKER_PREFIX) else {
        return Ok(None);
    };

    let Some(found) = options_pattern().find(body) else {
        return Ok(Some(RawSearch::new(body)));
    };

    let mut reason = String::new();
    for (offset, _) in body[found.start()..].match_indices('{') {
        let start = found.start() + offset;
        match serde_json::from_str::<Value>(&body[start..]) {
            Ok(Value::Object(options)) => {
                return Ok(Some(RawSearch {
                    query: body[..start].to_string(),
                    options,
                }))
            }
            Ok(other) => reason = format!("expected a JSON object, got {other}"),
            Err(e) => reason = e.to_string(),
        }
    }

    Err(FtsError::InvalidSearchOptions {
        path: path.to_string(),
        reason,
    })
}

/// Collect the marker leaves of a flattened filter that target bound columns.
pub fn extract(
    target_columns: &HashSet<String>,
    flattened: &FlatFilter,
) -> Result<IndexMap<String, RawSearch>, FtsError> {
    let mut extracted = IndexMap::new();

    for (path, value) in flattened {
        if !target_columns.contains(last_segment(path)) {
            continue;
        }
        let Some(text) = value.as_str() else {
            continue;
        };
        if let Some(raw) = parse_marker(path, text)? {
            extracted.insert(path.clone(), raw);
        }
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn flat(entries: &[(&str, Value)]) -> FlatFilter {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_plain_marker() {
        let raw = parse_marker("content", "fts:alpha beta").unwrap().unwrap();
        assert_eq!(raw.query, "alpha beta");
        assert!(raw.options.is_empty());
    }

    #[test]
    fn test_parse_marker_with_options() {
        let raw = parse_marker("content", r#"fts:foo{"offset":5}"#)
            .unwrap()
            .unwrap();
        assert_eq!(raw.query, "foo");
        assert_eq!(Value::Object(raw.options), json!({ "offset": 5 }));
    }

    #[test]
    fn test_parse_marker_nested_options() {
        let raw = parse_marker("content", r#"fts:foo{"a":{"b":1},"c":[1]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(raw.query, "foo");
        assert_eq!(Value::Object(raw.options), json!({ "a": { "b": 1 }, "c": [1] }));
    }

    #[test]
    fn test_parse_marker_later_brace_wins_when_leftmost_invalid() {
        let raw = parse_marker("content", r#"fts:a {b} c{"x":1}"#)
            .unwrap()
            .unwrap();
        assert_eq!(raw.query, "a {b} c");
        assert_eq!(Value::Object(raw.options), json!({ "x": 1 }));
    }

    #[test]
    fn test_parse_marker_invalid_options() {
        let err = parse_marker("AND.0.content", "fts:foo{not json}").unwrap_err();
        match err {
            FtsError::InvalidSearchOptions { path, .. } => assert_eq!(path, "AND.0.content"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_parse_non_marker() {
        assert!(parse_marker("content", "alpha").unwrap().is_none());
        assert!(parse_marker("content", "FTS:alpha").unwrap().is_none());
    }

    #[test]
    fn test_extract_targets_only_bound_columns() {
        let flattened = flat(&[
            ("AND.0.content", json!("fts:alpha")),
            ("AND.1.title", json!("fts:beta")),
            ("AND.2.content", json!("plain")),
            ("AND.3.content.contains", json!("fts:gamma")),
            ("published", json!(true)),
        ]);

        let extracted = extract(&columns(&["content"]), &flattened).unwrap();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted["AND.0.content"], RawSearch::new("alpha"));
    }

    #[test]
    fn test_extract_ignores_non_string_values() {
        let flattened = flat(&[("content", json!(1)), ("title", Value::Null)]);
        let extracted = extract(&columns(&["content", "title"]), &flattened).unwrap();
        assert!(extracted.is_empty());
    }
}
