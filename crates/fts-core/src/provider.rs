//! Search provider capability and column bindings.
//!
//! A provider is any full-text back-end that can answer a query for one
//! column of one destination and keep documents in that destination up to
//! date. Concrete back-ends live in `fts-providers`; [`MockSearchProvider`]
//! records calls for tests.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use fts_types::ProviderError;

/// Options passed through from a marker to the provider.
pub type SearchOptions = Map<String, Value>;

/// Field values written to an external document.
pub type Document = Map<String, Value>;

/// One search result; only the identifier matters to the rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
}

impl SearchHit {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Trait for full-text search back-ends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable identity of the physical back-end (cluster, application, ...).
    ///
    /// Two bindings with the same provider id and destination address the
    /// same external document.
    fn id(&self) -> &str;

    /// Run a query against one column of a destination, returning hits in
    /// provider order.
    async fn search(
        &self,
        destination: &str,
        column: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, ProviderError>;

    /// Create or replace the document `id` in `destination`.
    async fn upsert_document(
        &self,
        destination: &str,
        id: &str,
        fields: &Document,
    ) -> Result<(), ProviderError>;

    /// Remove the document `id` from `destination`.
    async fn delete_document(&self, destination: &str, id: &str) -> Result<(), ProviderError>;
}

/// Provider and destination a column is bound to.
#[derive(Clone)]
pub struct ColumnBinding {
    pub provider: Arc<dyn SearchProvider>,
    pub destination: String,
}

impl fmt::Debug for ColumnBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnBinding")
            .field("provider", &self.provider.id())
            .field("destination", &self.destination)
            .finish()
    }
}

/// Column name -> provider binding for one entity.
#[derive(Debug, Clone, Default)]
pub struct ProviderBinding {
    columns: IndexMap<String, ColumnBinding>,
}

impl ProviderBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a column (builder style).
    pub fn with_column(
        mut self,
        column: impl Into<String>,
        provider: Arc<dyn SearchProvider>,
        destination: impl Into<String>,
    ) -> Self {
        self.bind(column, provider, destination);
        self
    }

    /// Bind a column, replacing any previous binding.
    pub fn bind(
        &mut self,
        column: impl Into<String>,
        provider: Arc<dyn SearchProvider>,
        destination: impl Into<String>,
    ) {
        self.columns.insert(
            column.into(),
            ColumnBinding {
                provider,
                destination: destination.into(),
            },
        );
    }

    pub fn get(&self, column: &str) -> Option<&ColumnBinding> {
        self.columns.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnBinding)> {
        self.columns.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.columns.keys()
    }

    /// Bound column names as a set, the marker extractor's target columns.
    pub fn column_set(&self) -> HashSet<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A call observed by [`MockSearchProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Search {
        destination: String,
        column: String,
        query: String,
        options: SearchOptions,
    },
    Upsert {
        destination: String,
        id: String,
        fields: Document,
    },
    Delete {
        destination: String,
        id: String,
    },
}

/// Mock provider for testing.
#[derive(Default)]
pub struct MockSearchProvider {
    id: String,
    /// Hits to return per (column, query)
    hits: HashMap<(String, String), Vec<String>>,
    /// Queries that fail
    failing_queries: HashSet<String>,
    /// Destinations whose writes fail
    failing_destinations: HashSet<String>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl MockSearchProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Return `ids` when `column` is searched for `query`.
    pub fn with_hits<I, S>(mut self, column: &str, query: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hits.insert(
            (column.to_string(), query.to_string()),
            ids.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Fail every search for `query`.
    pub fn with_failing_query(mut self, query: &str) -> Self {
        self.failing_queries.insert(query.to_string());
        self
    }

    /// Fail every upsert and delete on `destination`.
    pub fn with_failing_destination(mut self, destination: &str) -> Self {
        self.failing_destinations.insert(destination.to_string());
        self
    }

    /// All calls so far, in completion order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn search_calls(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProviderCall::Search { .. }))
            .collect()
    }

    pub fn upsert_calls(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProviderCall::Upsert { .. }))
            .collect()
    }

    pub fn delete_calls(&self) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProviderCall::Delete { .. }))
            .collect()
    }

    fn record(&self, call: ProviderCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(
        &self,
        destination: &str,
        column: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        self.record(ProviderCall::Search {
            destination: destination.to_string(),
            column: column.to_string(),
            query: query.to_string(),
            options: options.clone(),
        });

        if self.failing_queries.contains(query) {
            return Err(ProviderError::Rejected(format!("search for {query:?} failed")));
        }

        Ok(self
            .hits
            .get(&(column.to_string(), query.to_string()))
            .map(|ids| ids.iter().map(SearchHit::new).collect())
            .unwrap_or_default())
    }

    async fn upsert_document(
        &self,
        destination: &str,
        id: &str,
        fields: &Document,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::Upsert {
            destination: destination.to_string(),
            id: id.to_string(),
            fields: fields.clone(),
        });

        if self.failing_destinations.contains(destination) {
            return Err(ProviderError::Rejected(format!("upsert to {destination} failed")));
        }
        Ok(())
    }

    async fn delete_document(&self, destination: &str, id: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::Delete {
            destination: destination.to_string(),
            id: id.to_string(),
        });

        if self.failing_destinations.contains(destination) {
            return Err(ProviderError::Rejected(format!("delete on {destination} failed")));
        }
        Ok(())
    }
}
