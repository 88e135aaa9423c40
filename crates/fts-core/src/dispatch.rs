//! Concurrent search dispatch.

use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::debug;

use fts_types::{FtsError, PkSpec, RecordId};

use crate::codec::last_segment;
use crate::marker::RawSearch;
use crate::provider::ProviderBinding;

/// Run every extracted search against its column's provider.
///
/// All searches are polled together on the caller's task. The first failure
/// fails the whole dispatch and the remaining results are discarded.
/// Identifiers keep provider order.
pub async fn dispatch(
    bindings: &ProviderBinding,
    pk: &PkSpec,
    extracted: &IndexMap<String, RawSearch>,
) -> Result<IndexMap<String, Vec<RecordId>>, FtsError> {
    let searches = extracted.iter().map(|(path, raw)| async move {
        let column = last_segment(path);
        let binding = bindings
            .get(column)
            .ok_or_else(|| FtsError::UnboundColumn(column.to_string()))?;

        let hits = binding
            .provider
            .search(&binding.destination, column, &raw.query, &raw.options)
            .await?;

        debug!(
            path = %path,
            provider = %binding.provider.id(),
            destination = %binding.destination,
            hits = hits.len(),
            "Search dispatched"
        );

        let ids = hits
            .iter()
            .map(|hit| pk.coerce(&hit.id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok::<_, FtsError>((path.clone(), ids))
    });

    let results = try_join_all(searches).await?;
    Ok(results.into_iter().collect())
}
