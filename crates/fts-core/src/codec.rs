//! Path codec: filter tree <-> ordered map of dotted paths.
//!
//! Combinator children contribute their index as a path segment, so
//! `{"AND": [{"content": "x"}]}` flattens to `{"AND.0.content": "x"}`.
//! Leaves keep their JSON value; an empty nested object flattens to `{}` and a
//! combinator without children to `[]`, which keeps the round trip lossless.

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use fts_types::{CombinatorKind, Filter, FilterNode, FtsError, Leaf, LeafValue};

/// Flattened filter in depth-first order.
pub type FlatFilter = IndexMap<String, Value>;

/// Join a path prefix and a segment with `.`.
pub fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Final segment of a path (the column name for a leaf).
pub fn last_segment(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((_, last)) => last,
        None => path,
    }
}

/// Path without its final segment; empty for root-level paths.
pub fn parent_path(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((parent, _)) => parent,
        None => "",
    }
}

/// Flatten a filter into dotted paths.
pub fn flatten(filter: &Filter) -> FlatFilter {
    let mut out = FlatFilter::new();
    flatten_into(filter, "", &mut out);
    out
}

fn flatten_into(filter: &Filter, prefix: &str, out: &mut FlatFilter) {
    if filter.is_empty() {
        if !prefix.is_empty() {
            out.insert(prefix.to_string(), Value::Object(Map::new()));
        }
        return;
    }

    for node in &filter.nodes {
        match node {
            FilterNode::Combinator(c) => {
                let path = join_path(prefix, c.kind.as_str());
                if c.children.is_empty() {
                    out.insert(path, Value::Array(Vec::new()));
                    continue;
                }
                for (i, child) in c.children.iter().enumerate() {
                    flatten_into(child, &join_path(&path, &i.to_string()), out);
                }
            }
            FilterNode::Leaf(leaf) => {
                let path = join_path(prefix, &leaf.field);
                match &leaf.value {
                    LeafValue::Object(inner) => flatten_into(inner, &path, out),
                    other => {
                        out.insert(path, other.to_json());
                    }
                }
            }
        }
    }
}

enum Slot {
    Value(Value),
    Branch(IndexMap<String, Slot>),
}

/// Rebuild a filter from dotted paths.
///
/// Shared prefixes become nested objects; numeric segments under a
/// combinator become its children, ordered by index.
pub fn unflatten(flat: &FlatFilter) -> Result<Filter, FtsError> {
    let mut root: IndexMap<String, Slot> = IndexMap::new();
    for (path, value) in flat {
        insert_path(&mut root, path, value.clone())?;
    }
    branch_to_filter(root, "")
}

fn insert_path(
    root: &mut IndexMap<String, Slot>,
    path: &str,
    value: Value,
) -> Result<(), FtsError> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err(FtsError::PathConflict(path.to_string()));
    };

    let mut node = root;
    for segment in parents {
        node = match node
            .entry(segment.to_string())
            .or_insert_with(|| Slot::Branch(IndexMap::new()))
        {
            Slot::Branch(children) => children,
            Slot::Value(_) => return Err(FtsError::PathConflict(path.to_string())),
        };
    }

    match node.entry(last.to_string()) {
        Entry::Vacant(entry) => {
            entry.insert(Slot::Value(value));
            Ok(())
        }
        Entry::Occupied(_) => Err(FtsError::PathConflict(path.to_string())),
    }
}

fn branch_to_filter(branch: IndexMap<String, Slot>, prefix: &str) -> Result<Filter, FtsError> {
    let mut nodes = Vec::with_capacity(branch.len());

    for (key, slot) in branch {
        let path = join_path(prefix, &key);

        if let Some(kind) = CombinatorKind::parse(&key) {
            let children = match slot {
                Slot::Value(Value::Array(items)) if items.is_empty() => Vec::new(),
                Slot::Value(_) => return Err(FtsError::PathConflict(path)),
                Slot::Branch(entries) => combinator_children(entries, &path)?,
            };
            nodes.push(FilterNode::combinator(kind, children));
            continue;
        }

        if key.is_empty() {
            return Err(FtsError::InvalidFilter(format!("empty segment in path {path:?}")));
        }
        let value = match slot {
            Slot::Value(value) => LeafValue::from_json(&value)?,
            Slot::Branch(entries) => LeafValue::Object(branch_to_filter(entries, &path)?),
        };
        nodes.push(FilterNode::Leaf(Leaf { field: key, value }));
    }

    Ok(Filter { nodes })
}

fn combinator_children(entries: IndexMap<String, Slot>, path: &str) -> Result<Vec<Filter>, FtsError> {
    let mut indexed = Vec::with_capacity(entries.len());
    for (segment, slot) in entries {
        let child_path = join_path(path, &segment);
        let index: usize = segment
            .parse()
            .map_err(|_| FtsError::PathConflict(child_path.clone()))?;
        indexed.push((index, child_path, slot));
    }
    indexed.sort_by_key(|(index, _, _)| *index);

    indexed
        .into_iter()
        .map(|(_, child_path, slot)| match slot {
            Slot::Branch(entries) => branch_to_filter(entries, &child_path),
            Slot::Value(value @ Value::Object(_)) => Filter::from_json(&value),
            Slot::Value(_) => Err(FtsError::PathConflict(child_path)),
        })
        .collect()
}
