//! # fts-types
//!
//! Shared domain types for fts-bridge.
//!
//! This crate defines the data structures passed between the rewrite core,
//! the provider adapters and the CLI:
//! - Filters: the nested boolean where-expression a caller narrows a query with
//! - Records and identifiers: mutated rows and the primary keys providers return
//! - Settings: provider and per-entity binding configuration
//! - Errors: the failure taxonomy shared by every crate
//!
//! ## Usage
//!
//! ```rust
//! use fts_types::Filter;
//! use serde_json::json;
//!
//! let filter = Filter::from_json(&json!({ "content": "fts:alpha" })).unwrap();
//! assert_eq!(filter.to_json(), json!({ "content": "fts:alpha" }));
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod record;

pub use config::{
    AlgoliaSettings, ColumnSettings, EntitySettings, HttpProviderSettings, MutationKind,
    ProviderSettings, Settings, TantivySettings,
};
pub use error::{FtsError, FtsResult, ProviderError};
pub use filter::{Combinator, CombinatorKind, Filter, FilterNode, Leaf, LeafValue};
pub use record::{is_blank, PkSpec, Record, RecordId};

/// Reserved prefix that marks a filter value as a full-text search request.
pub const MARKER_PREFIX: &str = "fts:";
