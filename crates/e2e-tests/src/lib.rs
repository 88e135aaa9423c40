//! End-to-end test infrastructure for fts-bridge.
//!
//! Provides a shared TestHarness that puts an in-memory record store behind
//! [`FtsMiddleware`], with a directory-backed Tantivy provider as the search
//! back-end, so tests can drive the full mutate-sync-search-rewrite loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use fts_core::{Action, EntityBinding, FtsMiddleware, ProviderBinding, QueryParams};
use fts_providers::{TantivyConfig, TantivyProvider};
use fts_types::{FtsError, MutationKind, PkSpec, Record};

/// Entity name used by the harness.
pub const POST: &str = "Post";

/// Destination holding post documents.
pub const POSTS_INDEX: &str = "posts";

/// In-memory record store understanding a small filter dialect.
///
/// Supports `AND` / `OR` / `NOT`, equality, and the `in`, `equals` and
/// `contains` operators, which is enough to evaluate rewritten filters.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a record-store call.
    pub fn execute(&self, params: &QueryParams) -> Result<Value, String> {
        let mut rows = self.rows.lock().map_err(|e| e.to_string())?;
        let filter = params.args.get("where").cloned().unwrap_or_else(|| json!({}));

        match params.action {
            Action::Create => {
                let data = params
                    .args
                    .get("data")
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or("create requires data")?;
                rows.push(data.clone());
                Ok(select(&data, params.args.get("select")))
            }
            Action::Update => {
                let row = rows
                    .iter_mut()
                    .find(|row| matches(&filter, row))
                    .ok_or("record not found")?;
                if let Some(data) = params.args.get("data").and_then(Value::as_object) {
                    for (key, value) in data {
                        row.insert(key.clone(), value.clone());
                    }
                }
                Ok(select(row, params.args.get("select")))
            }
            Action::Delete => {
                let index = rows
                    .iter()
                    .position(|row| matches(&filter, row))
                    .ok_or("record not found")?;
                let row = rows.remove(index);
                Ok(select(&row, params.args.get("select")))
            }
            Action::FindMany => Ok(Value::Array(
                rows.iter()
                    .filter(|row| matches(&filter, row))
                    .map(|row| Value::Object(row.clone()))
                    .collect(),
            )),
            Action::FindFirst => Ok(rows
                .iter()
                .find(|row| matches(&filter, row))
                .map(|row| Value::Object(row.clone()))
                .unwrap_or(Value::Null)),
            Action::Count => Ok(json!(rows.iter().filter(|row| matches(&filter, row)).count())),
            other => Err(format!("unsupported action {other:?}")),
        }
    }
}

fn select(row: &Record, select: Option<&Value>) -> Value {
    let Some(Value::Object(fields)) = select else {
        return Value::Object(row.clone());
    };
    let picked: Map<String, Value> = row
        .iter()
        .filter(|(key, _)| fields.get(*key).and_then(Value::as_bool).unwrap_or(false))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(picked)
}

fn operands(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Evaluate a where-object against a row.
pub fn matches(filter: &Value, row: &Record) -> bool {
    let Some(conditions) = filter.as_object() else {
        return false;
    };
    conditions.iter().all(|(key, condition)| match key.as_str() {
        "AND" => operands(condition).into_iter().all(|f| matches(f, row)),
        "OR" => operands(condition).into_iter().any(|f| matches(f, row)),
        "NOT" => !operands(condition).into_iter().any(|f| matches(f, row)),
        field => field_matches(row.get(field).unwrap_or(&Value::Null), condition),
    })
}

fn field_matches(actual: &Value, condition: &Value) -> bool {
    let Some(operators) = condition.as_object() else {
        return actual == condition;
    };
    operators.iter().all(|(op, operand)| match op.as_str() {
        "in" => operand.as_array().is_some_and(|items| items.contains(actual)),
        "equals" => actual == operand,
        "contains" => match (actual.as_str(), operand.as_str()) {
            (Some(text), Some(needle)) => text.contains(needle),
            _ => false,
        },
        _ => false,
    })
}

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Path of the Tantivy indexes
    pub index_path: PathBuf,
    pub provider: Arc<TantivyProvider>,
    pub middleware: FtsMiddleware,
    pub store: MemoryStore,
}

impl TestHarness {
    /// Harness syncing on every mutation kind.
    pub fn new() -> Self {
        Self::with_sync_on([
            MutationKind::Create,
            MutationKind::Update,
            MutationKind::Upsert,
            MutationKind::Delete,
        ])
    }

    /// Harness for the `Post` entity (numeric `id`, `title` and `content`
    /// bound to the `posts` index) syncing on the given mutations.
    pub fn with_sync_on(kinds: impl IntoIterator<Item = MutationKind>) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_path = temp_dir.path().join("indexes");

        let config = TantivyConfig::in_dir(&index_path).with_destination(POSTS_INDEX, ["title", "content"]);
        let provider = Arc::new(TantivyProvider::open("local", &config).expect("Failed to open provider"));

        let columns = ProviderBinding::new()
            .with_column("title", provider.clone(), POSTS_INDEX)
            .with_column("content", provider.clone(), POSTS_INDEX);
        let binding = EntityBinding::new(PkSpec::numeric("id"), columns).with_sync_on(kinds);

        let mut entities = HashMap::new();
        entities.insert(POST.to_string(), binding);

        Self {
            _temp_dir: temp_dir,
            index_path,
            provider,
            middleware: FtsMiddleware::new(entities),
            store: MemoryStore::new(),
        }
    }

    /// Run a call through the middleware into the store.
    pub async fn call(&self, action: Action, args: Value) -> Result<Value, FtsError> {
        let params = QueryParams::new(POST, action, args);
        self.middleware
            .handle(params, |params| async move { self.store.execute(&params) })
            .await
    }

    /// Create a post through the middleware.
    pub async fn create_post(&self, id: i64, title: &str, content: &str) -> Value {
        self.call(
            Action::Create,
            json!({ "data": { "id": id, "title": title, "content": content, "published": true } }),
        )
        .await
        .expect("Failed to create post")
    }

    /// Ids of the posts matching `where`, sorted.
    pub async fn find_ids(&self, filter: Value) -> Vec<i64> {
        let found = self
            .call(Action::FindMany, json!({ "where": filter }))
            .await
            .expect("Failed to find posts");
        let mut ids: Vec<i64> = found
            .as_array()
            .expect("findMany returns an array")
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_i64))
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
