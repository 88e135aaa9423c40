//! # fts-core
//!
//! Full-text marker rewriting for record filters.
//!
//! A caller writes an ordinary nested filter and puts `fts:<query>` on a
//! column that is bound to a search provider. The rewrite flattens the tree,
//! extracts the markers, runs the searches concurrently, intersects the
//! identifier sets that land on the same parent object and splices
//! `<pk>: { in: [...] }` membership predicates back into the tree.
//!
//! The write side mirrors this: a mutated record is split per physical
//! destination and each destination receives one upsert or delete.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use fts_core::{rewrite_filter, MockSearchProvider, ProviderBinding};
//! use fts_types::{Filter, PkSpec};
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let provider = Arc::new(MockSearchProvider::new("mock").with_hits("content", "alpha", ["1", "2"]));
//! let bindings = ProviderBinding::new().with_column("content", provider, "post_index");
//!
//! let filter = Filter::from_json(&json!({ "content": "fts:alpha" })).unwrap();
//! let rewritten = rewrite_filter(&bindings, &PkSpec::numeric("id"), &filter).await.unwrap();
//! assert_eq!(rewritten.to_json(), json!({ "id": { "in": [1, 2] } }));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod codec;
pub mod consolidate;
pub mod dispatch;
pub mod marker;
pub mod merge;
pub mod middleware;
pub mod provider;
pub mod rebuild;
pub mod rewrite;

pub use codec::{flatten, unflatten, FlatFilter};
pub use consolidate::{group_columns, sync_delete, sync_upsert, DestinationKey, IndexGroup};
pub use dispatch::dispatch;
pub use marker::{extract, parse_marker, RawSearch};
pub use merge::{merge, parent_key, MergedPredicates};
pub use middleware::{Action, EntityBinding, FtsMiddleware, QueryParams};
pub use provider::{
    ColumnBinding, Document, MockSearchProvider, ProviderBinding, ProviderCall, SearchHit,
    SearchOptions, SearchProvider,
};
pub use rebuild::rebuild;
pub use rewrite::rewrite_filter;

/// Commonly used items.
pub mod prelude {
    pub use crate::middleware::{Action, EntityBinding, FtsMiddleware, QueryParams};
    pub use crate::provider::{ProviderBinding, SearchProvider};
    pub use crate::rewrite::rewrite_filter;
    pub use fts_types::{Filter, FtsError, MutationKind, PkSpec, Record, RecordId};
}
