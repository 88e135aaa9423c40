//! Command implementations for the `fts` tool.
//!
//! Handles:
//! - rewrite: Rewrite the markers of a filter against the configured providers
//! - sync / delete: Push or remove a record's documents
//! - config: Print the effective settings with secrets redacted

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::info;

use fts_core::{rewrite_filter, sync_delete, sync_upsert, EntityBinding};
use fts_providers::ProviderRegistry;
use fts_types::{Filter, Record, Settings};

/// Load settings and apply CLI overrides.
pub fn load_settings(config_path: Option<&str>, log_level_override: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;
    Ok(())
}

fn entity_binding(settings: &Settings, entity: &str) -> Result<EntityBinding> {
    let Some(entity_settings) = settings.entities.get(entity) else {
        bail!("Entity {entity} is not configured");
    };
    let registry = ProviderRegistry::from_settings(settings).context("Failed to build providers")?;
    Ok(registry.entity_binding(entity, entity_settings)?)
}

fn parse_record(json: &str) -> Result<Record> {
    let value: Value = serde_json::from_str(json).context("Record is not valid JSON")?;
    match value {
        Value::Object(record) => Ok(record),
        other => bail!("Record must be a JSON object, got {other}"),
    }
}

/// Rewrite a filter and return it as pretty-printed JSON.
pub async fn run_rewrite(settings: &Settings, entity: &str, filter: &str) -> Result<String> {
    let binding = entity_binding(settings, entity)?;
    let value: Value = serde_json::from_str(filter).context("Filter is not valid JSON")?;
    let filter = Filter::from_json(&value)?;

    let rewritten = rewrite_filter(&binding.columns, &binding.pk, &filter)
        .await
        .context("Failed to rewrite filter")?;

    Ok(serde_json::to_string_pretty(&rewritten.to_json())?)
}

/// Upsert a record's documents.
pub async fn run_sync(settings: &Settings, entity: &str, record: &str) -> Result<()> {
    let binding = entity_binding(settings, entity)?;
    let record = parse_record(record)?;

    sync_upsert(&binding.columns, &record, &binding.pk)
        .await
        .context("Failed to sync record")?;

    info!(entity, "Record synced");
    Ok(())
}

/// Delete a record's documents.
pub async fn run_delete(settings: &Settings, entity: &str, record: &str) -> Result<()> {
    let binding = entity_binding(settings, entity)?;
    let record = parse_record(record)?;

    sync_delete(&binding.columns, &record, &binding.pk)
        .await
        .context("Failed to delete record documents")?;

    info!(entity, "Record documents deleted");
    Ok(())
}

/// Render the effective settings as TOML.
pub fn show_config(settings: &Settings) -> Result<String> {
    toml::to_string_pretty(settings).context("Failed to render configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(index_dir: &TempDir) -> Settings {
        let source = format!(
            r#"
[providers.local]
kind = "tantivy"
path = "{}"

[providers.local.destinations]
posts = ["title", "content"]

[entities.post]
primary_key = "id"
numeric = true

[entities.post.columns]
title = {{ provider = "local", destination = "posts" }}
content = {{ provider = "local", destination = "posts" }}
"#,
            index_dir.path().display()
        );
        Settings::from_toml(&source).unwrap()
    }

    #[tokio::test]
    async fn test_sync_then_rewrite() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);

        run_sync(&settings, "post", r#"{"id": 1, "title": "hello world", "content": "first"}"#)
            .await
            .unwrap();
        run_sync(&settings, "post", r#"{"id": 2, "title": "goodbye", "content": "second"}"#)
            .await
            .unwrap();

        let output = run_rewrite(&settings, "post", r#"{"title": "fts:hello", "published": true}"#)
            .await
            .unwrap();
        let rewritten: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            rewritten,
            serde_json::json!({ "id": { "in": [1] }, "published": true })
        );

        run_delete(&settings, "post", r#"{"id": 1}"#).await.unwrap();
        let output = run_rewrite(&settings, "post", r#"{"title": "fts:hello"}"#)
            .await
            .unwrap();
        let rewritten: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(rewritten, serde_json::json!({ "id": { "in": [] } }));
    }

    #[tokio::test]
    async fn test_unknown_entity() {
        let dir = TempDir::new().unwrap();
        let err = run_rewrite(&settings(&dir), "user", "{}").await.unwrap_err();
        assert!(err.to_string().contains("Entity user is not configured"));
    }

    #[tokio::test]
    async fn test_record_must_be_object() {
        let dir = TempDir::new().unwrap();
        let err = run_sync(&settings(&dir), "post", "[1, 2]").await.unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn test_show_config_redacts_secrets() {
        let settings = Settings::from_toml(
            r#"
[providers.search]
kind = "elasticsearch"
url = "http://localhost:9200"
username = "elastic"
password = "hunter2"
"#,
        )
        .unwrap();

        let rendered = show_config(&settings).unwrap();
        assert!(rendered.contains("kind = \"elasticsearch\""));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }
}
