//! Tree rebuilding.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use fts_types::{Filter, FtsError, RecordId};

use crate::codec::{parent_path, unflatten, FlatFilter};
use crate::merge::MergedPredicates;

/// Parent object of a membership key (`AND.0.id.in` -> `AND.0`).
fn membership_parent(key: &str) -> &str {
    parent_path(parent_path(key))
}

/// Replace marker leaves with merged membership predicates and unflatten.
///
/// Each merged predicate takes the position of the first marker it replaces,
/// so the rebuilt tree keeps the caller's field order. If the caller already
/// has the same membership key, the two lists are intersected and the result
/// stays at the caller's position. Non-marker entries are carried verbatim.
pub fn rebuild(
    flattened: &FlatFilter,
    extracted_paths: &IndexSet<String>,
    merged: &MergedPredicates,
) -> Result<Filter, FtsError> {
    let narrowed = narrow(flattened, merged);

    // membership parent -> merged key, in merged order
    let mut pending: IndexMap<&str, &str> = narrowed
        .keys()
        .map(|key| (membership_parent(key), key.as_str()))
        .collect();

    let mut out = FlatFilter::with_capacity(flattened.len());
    for (path, value) in flattened {
        if extracted_paths.contains(path) {
            if let Some(key) = pending.shift_remove(parent_path(path)) {
                out.insert(key.to_string(), membership_value(&narrowed[key]));
            }
            continue;
        }
        if let Some(ids) = narrowed.get(path) {
            pending.shift_remove(membership_parent(path));
            out.insert(path.clone(), membership_value(ids));
            continue;
        }
        out.insert(path.clone(), value.clone());
    }

    for key in pending.values() {
        out.insert(key.to_string(), membership_value(&narrowed[*key]));
    }

    unflatten(&out)
}

/// Intersect merged candidates with the caller's own list under the same key.
fn narrow(flattened: &FlatFilter, merged: &MergedPredicates) -> MergedPredicates {
    merged
        .iter()
        .map(|(key, ids)| {
            let ids = match flattened.get(key) {
                Some(Value::Array(allowed)) => ids
                    .iter()
                    .filter(|id| allowed.contains(&id.to_json()))
                    .cloned()
                    .collect(),
                Some(allowed) => ids
                    .iter()
                    .filter(|id| id.to_json() == *allowed)
                    .cloned()
                    .collect(),
                None => ids.clone(),
            };
            (key.clone(), ids)
        })
        .collect()
}

fn membership_value(ids: &IndexSet<RecordId>) -> Value {
    Value::Array(ids.iter().map(|id| id.to_json()).collect())
}
