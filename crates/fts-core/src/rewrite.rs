//! Filter rewrite entry point.

use indexmap::IndexSet;
use tracing::debug;

use fts_types::{Filter, FtsError, PkSpec};

use crate::codec::flatten;
use crate::dispatch::dispatch;
use crate::marker::extract;
use crate::merge::merge;
use crate::provider::ProviderBinding;
use crate::rebuild::rebuild;

/// Rewrite every marker leaf of `filter` into a primary-key membership
/// predicate.
///
/// A filter without markers on bound columns is returned unchanged and no
/// provider is called. Any failure aborts the whole rewrite.
pub async fn rewrite_filter(
    bindings: &ProviderBinding,
    pk: &PkSpec,
    filter: &Filter,
) -> Result<Filter, FtsError> {
    let flattened = flatten(filter);
    let extracted = extract(&bindings.column_set(), &flattened)?;
    if extracted.is_empty() {
        return Ok(filter.clone());
    }

    debug!(markers = extracted.len(), "Rewriting filter");

    let dispatched = dispatch(bindings, pk, &extracted).await?;
    let merged = merge(pk, &dispatched);
    let extracted_paths: IndexSet<String> = extracted.into_keys().collect();

    rebuild(&flattened, &extracted_paths, &merged)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::provider::MockSearchProvider;
    use serde_json::{json, Value};

    fn filter(value: Value) -> Filter {
        Filter::from_json(&value).unwrap()
    }

    #[tokio::test]
    async fn test_no_markers_no_calls() {
        let mock = Arc::new(MockSearchProvider::new("es"));
        let bindings = ProviderBinding::new().with_column("content", mock.clone(), "post_index");

        let input = filter(json!({ "published": true, "content": "plain", "title": "fts:ignored" }));
        let output = rewrite_filter(&bindings, &PkSpec::numeric("id"), &input)
            .await
            .unwrap();

        assert_eq!(output, input);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sibling_markers_intersect() {
        let mock = Arc::new(
            MockSearchProvider::new("es")
                .with_hits("content", "alpha", ["1", "2", "3"])
                .with_hits("title", "beta", ["2", "3", "4"]),
        );
        let bindings = ProviderBinding::new()
            .with_column("content", mock.clone(), "post_index")
            .with_column("title", mock.clone(), "post_index");

        let input = filter(json!({
            "AND": [{ "content": "fts:alpha", "title": "fts:beta", "published": true }]
        }));
        let output = rewrite_filter(&bindings, &PkSpec::numeric("id"), &input)
            .await
            .unwrap();

        assert_eq!(
            output.to_json(),
            json!({ "AND": [{ "id": { "in": [2, 3] }, "published": true }] })
        );
        assert_eq!(mock.search_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_or_branches_stay_independent() {
        let mock = Arc::new(
            MockSearchProvider::new("es")
                .with_hits("content", "alpha", ["1"])
                .with_hits("title", "beta", ["2"]),
        );
        let bindings = ProviderBinding::new()
            .with_column("content", mock.clone(), "post_index")
            .with_column("title", mock, "post_index");

        let input = filter(json!({
            "OR": [{ "content": "fts:alpha" }, { "title": "fts:beta" }],
            "published": true
        }));
        let output = rewrite_filter(&bindings, &PkSpec::numeric("id"), &input)
            .await
            .unwrap();

        assert_eq!(
            output.to_json(),
            json!({
                "OR": [{ "id": { "in": [1] } }, { "id": { "in": [2] } }],
                "published": true
            })
        );
    }

    #[tokio::test]
    async fn test_string_primary_key() {
        let mock = Arc::new(MockSearchProvider::new("algolia").with_hits("bio", "rust", ["u-1"]));
        let bindings = ProviderBinding::new().with_column("bio", mock, "users");

        let input = filter(json!({ "author": { "is": { "bio": "fts:rust" } } }));
        let output = rewrite_filter(&bindings, &PkSpec::string("uuid"), &input)
            .await
            .unwrap();

        assert_eq!(
            output.to_json(),
            json!({ "author": { "is": { "uuid": { "in": ["u-1"] } } } })
        );
    }

    #[tokio::test]
    async fn test_existing_membership_is_not_widened() {
        let mock = Arc::new(MockSearchProvider::new("es").with_hits("content", "alpha", ["1", "9"]));
        let bindings = ProviderBinding::new().with_column("content", mock, "post_index");

        let input = filter(json!({ "id": { "in": [9] }, "content": "fts:alpha" }));
        let output = rewrite_filter(&bindings, &PkSpec::numeric("id"), &input)
            .await
            .unwrap();

        assert_eq!(output.to_json(), json!({ "id": { "in": [9] } }));
    }

    #[tokio::test]
    async fn test_provider_failure_aborts() {
        let mock = Arc::new(MockSearchProvider::new("es").with_failing_query("boom"));
        let bindings = ProviderBinding::new().with_column("content", mock, "post_index");

        let input = filter(json!({ "content": "fts:boom" }));
        let err = rewrite_filter(&bindings, &PkSpec::numeric("id"), &input)
            .await
            .unwrap_err();
        assert!(matches!(err, FtsError::Provider(_)));
    }
}
