//! Predicate merging.
//!
//! Each marker path is mapped to a membership key on its parent object; all
//! identifier lists landing on the same key are intersected.

use std::collections::HashSet;

use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};

use fts_types::{PkSpec, RecordId};

use crate::codec::{join_path, parent_path};

/// Membership key (`<parent>.<pk>.in`) -> candidate identifiers.
pub type MergedPredicates = IndexMap<String, IndexSet<RecordId>>;

/// Replace a marker path's final segment with `<pk>.in`.
///
/// `AND.0.content` becomes `AND.0.id.in`; `content` becomes `id.in`.
pub fn parent_key(path: &str, pk: &PkSpec) -> String {
    join_path(parent_path(path), &pk.membership_suffix())
}

/// Merge dispatched identifier lists by parent key.
///
/// The first list for a key seeds the set; later lists intersect it. Keys
/// are kept in first-seen order and identifiers in seed order.
pub fn merge(pk: &PkSpec, dispatched: &IndexMap<String, Vec<RecordId>>) -> MergedPredicates {
    let mut merged = MergedPredicates::new();

    for (path, ids) in dispatched {
        match merged.entry(parent_key(path, pk)) {
            Entry::Vacant(entry) => {
                entry.insert(ids.iter().cloned().collect());
            }
            Entry::Occupied(mut entry) => {
                let incoming: HashSet<&RecordId> = ids.iter().collect();
                entry.get_mut().retain(|id| incoming.contains(id));
            }
        }
    }

    merged
}
