//! Write-side document consolidation.
//!
//! A mutated record is split into one document per physical destination,
//! so each external document receives a single write per mutation.

use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::debug;

use fts_types::{is_blank, FtsError, PkSpec, Record};

use crate::provider::{Document, ProviderBinding, SearchProvider};

/// Physical destination: provider identity plus destination name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    pub provider_id: String,
    pub destination: String,
}

/// Columns of one record headed for the same destination.
#[derive(Clone)]
pub struct IndexGroup {
    pub provider: Arc<dyn SearchProvider>,
    pub destination: String,
    pub fields: Document,
}

/// Group a record's non-blank bound column values by destination.
///
/// Destinations are visited in binding order; a destination with only blank
/// values still appears, with no fields.
pub fn group_columns(bindings: &ProviderBinding, record: &Record) -> IndexMap<DestinationKey, IndexGroup> {
    let mut groups: IndexMap<DestinationKey, IndexGroup> = IndexMap::new();

    for (column, binding) in bindings.iter() {
        let key = DestinationKey {
            provider_id: binding.provider.id().to_string(),
            destination: binding.destination.clone(),
        };
        let group = groups.entry(key).or_insert_with(|| IndexGroup {
            provider: Arc::clone(&binding.provider),
            destination: binding.destination.clone(),
            fields: Document::new(),
        });

        match record.get(column) {
            Some(value) if !is_blank(value) => {
                group.fields.insert(column.clone(), value.clone());
            }
            _ => {}
        }
    }

    groups
}

/// Upsert the record's searchable columns into every bound destination.
///
/// Every bound column must be present in the record, even if blank, so a
/// partial selection never overwrites a document with missing fields.
pub async fn sync_upsert(bindings: &ProviderBinding, record: &Record, pk: &PkSpec) -> Result<(), FtsError> {
    let id = pk.document_id(record)?;

    let missing: Vec<String> = bindings
        .columns()
        .filter(|column| !record.contains_key(column.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(FtsError::IncompleteSelection {
            primary_key: pk.field.clone(),
            missing,
        });
    }

    let groups = group_columns(bindings, record);
    let writes = groups
        .values()
        .filter(|group| !group.fields.is_empty())
        .map(|group| {
            let id = id.as_str();
            async move {
                group
                    .provider
                    .upsert_document(&group.destination, id, &group.fields)
                    .await
            }
        })
        .collect::<Vec<_>>();

    debug!(id = %id, destinations = writes.len(), "Syncing record upsert");
    try_join_all(writes).await?;
    Ok(())
}

/// Delete the record's document from every distinct bound destination.
pub async fn sync_delete(bindings: &ProviderBinding, record: &Record, pk: &PkSpec) -> Result<(), FtsError> {
    let id = pk.document_id(record)?;

    let groups = group_columns(bindings, record);
    let deletes = groups
        .values()
        .map(|group| {
            let id = id.as_str();
            async move { group.provider.delete_document(&group.destination, id).await }
        })
        .collect::<Vec<_>>();

    debug!(id = %id, destinations = deletes.len(), "Syncing record delete");
    try_join_all(deletes).await?;
    Ok(())
}
