//! # fts-providers
//!
//! Search back-ends implementing [`fts_core::SearchProvider`]:
//! - [`ElasticsearchProvider`]: Elasticsearch and OpenSearch clusters over REST
//! - [`AlgoliaProvider`]: Algolia applications over REST
//! - [`TantivyProvider`]: embedded Tantivy indexes, in RAM or on disk
//!
//! [`ProviderRegistry`] builds them from [`fts_types::Settings`] and resolves
//! entity bindings into an [`fts_core::FtsMiddleware`].

pub mod algolia;
pub mod elasticsearch;
pub mod embedded;
mod http;
pub mod registry;

pub use algolia::{AlgoliaConfig, AlgoliaProvider};
pub use elasticsearch::{ElasticsearchConfig, ElasticsearchProvider, Flavor};
pub use embedded::{TantivyConfig, TantivyProvider, ID_FIELD};
pub use registry::{build_middleware, ProviderRegistry};
