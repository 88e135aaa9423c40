//! Embedded Tantivy provider.
//!
//! One index per destination. Each index has a stored `_id` key field and
//! one TEXT field per declared column. Writes commit immediately and reload
//! the reader, so a document is searchable as soon as the sync returns.
//! Searches and commits run on the blocking pool.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value as _, STORED, STRING, TEXT};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use fts_core::{Document, SearchHit, SearchOptions, SearchProvider};
use fts_types::{ProviderError, TantivySettings};

/// Stored key field holding the document identifier.
pub const ID_FIELD: &str = "_id";

/// Default number of hits returned per search.
const DEFAULT_LIMIT: usize = 100;

/// Default memory budget for each index writer (50MB)
const DEFAULT_WRITER_MEMORY_MB: usize = 50;

/// Tantivy provider configuration
#[derive(Debug, Clone)]
pub struct TantivyConfig {
    /// Root directory, one sub-directory per destination (RAM when `None`)
    pub path: Option<PathBuf>,
    /// Destination name -> text columns
    pub destinations: BTreeMap<String, Vec<String>>,
    /// Memory budget for each writer in MB
    pub writer_memory_mb: usize,
}

impl Default for TantivyConfig {
    fn default() -> Self {
        Self {
            path: None,
            destinations: BTreeMap::new(),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }
}

impl TantivyConfig {
    /// RAM-backed indexes.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Directory-backed indexes under `path`.
    pub fn in_dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Declare a destination and its text columns.
    pub fn with_destination<I, S>(mut self, destination: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destinations.insert(
            destination.to_string(),
            columns.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn from_settings(settings: &TantivySettings) -> Self {
        Self {
            path: settings.path.clone(),
            destinations: settings.destinations.clone(),
            writer_memory_mb: settings.writer_memory_mb,
        }
    }
}

fn index_error(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Index(e.to_string())
}

/// Run index work on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T, ProviderError>
where
    F: FnOnce() -> Result<T, ProviderError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ProviderError::Index(format!("Index task failed: {e}")))?
}

fn build_schema(columns: &[String]) -> Result<Schema, ProviderError> {
    let mut builder = Schema::builder();
    builder.add_text_field(ID_FIELD, STRING | STORED);
    for column in columns {
        if column == ID_FIELD {
            return Err(ProviderError::Index(format!("{ID_FIELD} is a reserved field name")));
        }
        builder.add_text_field(column, TEXT);
    }
    Ok(builder.build())
}

fn open_or_create(path: Option<&Path>, schema: Schema) -> Result<Index, ProviderError> {
    let Some(path) = path else {
        return Ok(Index::create_in_ram(schema));
    };
    if path.join("meta.json").exists() {
        debug!(path = ?path, "Opening existing index");
        Index::open_in_dir(path).map_err(index_error)
    } else {
        info!(path = ?path, "Creating new index");
        std::fs::create_dir_all(path).map_err(index_error)?;
        Index::create_in_dir(path, schema).map_err(index_error)
    }
}

/// One destination's index with its writer and reader.
struct DestinationIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    id_field: Field,
    columns: HashMap<String, Field>,
}

impl DestinationIndex {
    fn open(path: Option<&Path>, columns: &[String], writer_memory_mb: usize) -> Result<Self, ProviderError> {
        let index = open_or_create(path, build_schema(columns)?)?;

        // Resolve fields from the index itself so a reopened index is checked
        // against the declared columns.
        let schema = index.schema();
        let id_field = schema.get_field(ID_FIELD).map_err(index_error)?;
        let columns = columns
            .iter()
            .map(|column| {
                schema
                    .get_field(column)
                    .map(|field| (column.clone(), field))
                    .map_err(index_error)
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let writer = index
            .writer_with_num_threads(1, writer_memory_mb * 1024 * 1024)
            .map_err(index_error)?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(index_error)?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            id_field,
            columns,
        })
    }

    fn search(
        &self,
        destination: &str,
        column: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let field = *self.columns.get(column).ok_or_else(|| ProviderError::UnknownColumn {
            destination: destination.to_string(),
            column: column.to_string(),
        })?;

        let searcher = self.reader.searcher();

        // Never ask the collector for more slots than there are documents.
        let limit = options
            .get("limit")
            .and_then(Value::as_u64)
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(DEFAULT_LIMIT)
            .min(usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX));
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut parser = QueryParser::for_index(&self.index, vec![field]);
        if options.get("conjunction").and_then(Value::as_bool).unwrap_or(false) {
            parser.set_conjunction_by_default();
        }
        let parsed = parser
            .parse_query(query)
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;

        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(limit))
            .map_err(index_error)?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address).map_err(index_error)?;
            if let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) {
                hits.push(SearchHit::new(id));
            }
        }
        Ok(hits)
    }

    fn upsert(&self, destination: &str, id: &str, fields: &Document) -> Result<(), ProviderError> {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.id_field, id);
        for (column, value) in fields {
            let field = *self.columns.get(column).ok_or_else(|| ProviderError::UnknownColumn {
                destination: destination.to_string(),
                column: column.clone(),
            })?;
            match value {
                Value::String(text) => doc.add_text(field, text),
                other => doc.add_text(field, other.to_string()),
            }
        }

        {
            let mut writer = self.writer.lock().map_err(index_error)?;
            writer.delete_term(Term::from_field_text(self.id_field, id));
            writer.add_document(doc).map_err(index_error)?;
            writer.commit().map_err(index_error)?;
        }
        self.reader.reload().map_err(index_error)
    }

    fn delete(&self, id: &str) -> Result<(), ProviderError> {
        {
            let mut writer = self.writer.lock().map_err(index_error)?;
            writer.delete_term(Term::from_field_text(self.id_field, id));
            writer.commit().map_err(index_error)?;
        }
        self.reader.reload().map_err(index_error)
    }

    fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

/// Provider backed by embedded Tantivy indexes.
pub struct TantivyProvider {
    id: String,
    destinations: HashMap<String, Arc<DestinationIndex>>,
}

impl TantivyProvider {
    /// Open or create one index per declared destination.
    pub fn open(id: impl Into<String>, config: &TantivyConfig) -> Result<Self, ProviderError> {
        let id = id.into();
        let mut destinations = HashMap::with_capacity(config.destinations.len());

        for (destination, columns) in &config.destinations {
            let path = config.path.as_ref().map(|root| root.join(destination));
            let index = DestinationIndex::open(path.as_deref(), columns, config.writer_memory_mb)?;
            destinations.insert(destination.clone(), Arc::new(index));
        }

        info!(
            provider = %id,
            destinations = destinations.len(),
            in_memory = config.path.is_none(),
            "Opened embedded search provider"
        );

        Ok(Self { id, destinations })
    }

    fn destination(&self, destination: &str) -> Result<Arc<DestinationIndex>, ProviderError> {
        self.destinations
            .get(destination)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownDestination(destination.to_string()))
    }

    /// Number of live documents in a destination.
    pub fn num_docs(&self, destination: &str) -> Result<u64, ProviderError> {
        Ok(self.destination(destination)?.num_docs())
    }
}

#[async_trait]
impl SearchProvider for TantivyProvider {
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
        let index = self.destination(destination)?;
        let (dest, col, text, opts) = (
            destination.to_string(),
            column.to_string(),
            query.to_string(),
            options.clone(),
        );
        let hits = run_blocking(move || index.search(&dest, &col, &text, &opts)).await?;
        debug!(provider = %self.id, destination, column, hits = hits.len(), "Embedded search complete");
        Ok(hits)
    }

    async fn upsert_document(
        &self,
        destination: &str,
        id: &str,
        fields: &Document,
    ) -> Result<(), ProviderError> {
        let index = self.destination(destination)?;
        let (dest, doc_id, doc) = (destination.to_string(), id.to_string(), fields.clone());
        run_blocking(move || index.upsert(&dest, &doc_id, &doc)).await?;
        debug!(provider = %self.id, destination, id, "Indexed document");
        Ok(())
    }

    async fn delete_document(&self, destination: &str, id: &str) -> Result<(), ProviderError> {
        let index = self.destination(destination)?;
        let doc_id = id.to_string();
        run_blocking(move || index.delete(&doc_id)).await?;
        debug!(provider = %self.id, destination, id, "Deleted document");
        Ok(())
    }
}
