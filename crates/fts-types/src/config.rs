//! Configuration loading for fts-bridge.
//!
//! Layered config: defaults -> config file -> CLI config file -> env vars.
//! The default config file lives at `<config dir>/fts-bridge/config.toml`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use config::{Config, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::FtsError;
use crate::record::PkSpec;

/// Record mutations that can trigger document sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Upsert,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Upsert => "upsert",
            MutationKind::Delete => "delete",
        }
    }
}

/// Settings for an Elasticsearch or OpenSearch cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderSettings {
    /// Base URL, e.g. "http://localhost:9200"
    pub url: String,

    /// Basic auth user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic auth password (loaded from env var, never printed)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "redact"
    )]
    pub password: Option<String>,

    /// API key sent as `Authorization: ApiKey ...`
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "redact"
    )]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for an Algolia application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgoliaSettings {
    pub app_id: String,

    #[serde(serialize_with = "redact_required")]
    pub api_key: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for the embedded Tantivy provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TantivySettings {
    /// Root directory; one sub-directory per destination. RAM when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Destination name -> indexed text columns
    #[serde(default)]
    pub destinations: BTreeMap<String, Vec<String>>,

    /// Memory budget for each index writer in MB
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,
}

/// A configured search back-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderSettings {
    Elasticsearch(HttpProviderSettings),
    Opensearch(HttpProviderSettings),
    Algolia(AlgoliaSettings),
    Tantivy(TantivySettings),
}

impl ProviderSettings {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderSettings::Elasticsearch(_) => "elasticsearch",
            ProviderSettings::Opensearch(_) => "opensearch",
            ProviderSettings::Algolia(_) => "algolia",
            ProviderSettings::Tantivy(_) => "tantivy",
        }
    }
}

/// Where one column's data is searched and written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSettings {
    /// Name of an entry under `[providers]`
    pub provider: String,
    /// Index / collection name inside that provider
    pub destination: String,
}

/// Full-text binding of one entity (record type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySettings {
    pub primary_key: String,

    /// Whether provider identifiers are converted to integers
    #[serde(default)]
    pub numeric: bool,

    /// Mutations that push documents to the providers
    #[serde(default)]
    pub sync_on: BTreeSet<MutationKind>,

    #[serde(default)]
    pub columns: BTreeMap<String, ColumnSettings>,
}

impl EntitySettings {
    pub fn pk(&self) -> PkSpec {
        PkSpec::new(self.primary_key.clone(), self.numeric)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,

    #[serde(default)]
    pub entities: BTreeMap<String, EntitySettings>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_writer_memory_mb() -> usize {
    50
}

fn redact<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => serializer.serialize_some("<redacted>"),
        None => serializer.serialize_none(),
    }
}

fn redact_required<S: Serializer>(_value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("<redacted>")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            providers: BTreeMap::new(),
            entities: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/fts-bridge/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (FTS_*, nested keys joined by `__`)
    ///
    /// Entity, column and provider names are case-sensitive, so the file
    /// layers are read as TOML tables directly; only the env layer goes
    /// through `config`, whose keys are folded onto the file keys.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, FtsError> {
        let config_dir = ProjectDirs::from("", "", "fts-bridge")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config.toml");

        let mut table = toml::Table::new();
        if default_config_path.is_file() {
            merge_tables(&mut table, read_layer(&default_config_path)?);
        }
        if let Some(path) = cli_config_path {
            merge_tables(&mut table, read_layer(Path::new(path))?);
        }

        // Format: FTS_LOG_LEVEL, FTS_PROVIDERS__SEARCH__URL, ...
        let env: toml::Table = Config::builder()
            .add_source(
                Environment::with_prefix("FTS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| FtsError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| FtsError::Config(e.to_string()))?;
        merge_env(&mut table, env);

        Self::from_table(table)
    }

    /// Parse settings from a TOML document without consulting files or env.
    pub fn from_toml(source: &str) -> Result<Self, FtsError> {
        let table: toml::Table = source
            .parse()
            .map_err(|e: toml::de::Error| FtsError::Config(e.to_string()))?;
        Self::from_table(table)
    }

    fn from_table(table: toml::Table) -> Result<Self, FtsError> {
        let settings: Settings = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| FtsError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check cross references between entities and providers.
    pub fn validate(&self) -> Result<(), FtsError> {
        for (entity, settings) in &self.entities {
            if settings.primary_key.is_empty() {
                return Err(FtsError::Config(format!(
                    "entity {entity}: primary_key must not be empty"
                )));
            }
            for (column, binding) in &settings.columns {
                if !self.providers.contains_key(&binding.provider) {
                    return Err(FtsError::Config(format!(
                        "entity {entity}: column {column} references unknown provider {}",
                        binding.provider
                    )));
                }
            }
        }
        Ok(())
    }
}

fn read_layer(path: &Path) -> Result<toml::Table, FtsError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| FtsError::Config(format!("{}: {e}", path.display())))?;
    source
        .parse()
        .map_err(|e: toml::de::Error| FtsError::Config(format!("{}: {e}", path.display())))
}

/// Deep-merge `overlay` into `base`; tables merge, everything else replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Like [`merge_tables`], but env keys arrive lowercased and match existing
/// keys case-insensitively.
fn merge_env(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let key = base
            .keys()
            .find(|existing| existing.eq_ignore_ascii_case(&key))
            .cloned()
            .unwrap_or(key);
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_env(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level = "debug"

[providers.search]
kind = "elasticsearch"
url = "http://localhost:9200"
password = "hunter2"

[providers.local]
kind = "tantivy"

[providers.local.destinations]
notes = ["note"]

[entities.post]
primary_key = "id"
numeric = true
sync_on = ["create", "delete"]

[entities.post.columns]
title = { provider = "search", destination = "post_index" }
content = { provider = "search", destination = "post_index" }
note = { provider = "local", destination = "notes" }
"#;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "info");
        assert!(settings.providers.is_empty());
        assert!(settings.entities.is_empty());
    }

    #[test]
    fn test_from_toml() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.providers.len(), 2);
        assert_eq!(settings.providers["search"].kind(), "elasticsearch");
        assert_eq!(settings.providers["local"].kind(), "tantivy");

        let post = &settings.entities["post"];
        assert_eq!(post.pk(), PkSpec::numeric("id"));
        assert!(post.sync_on.contains(&MutationKind::Create));
        assert!(!post.sync_on.contains(&MutationKind::Update));
        assert_eq!(post.columns["title"].destination, "post_index");
        assert_eq!(post.columns["note"].provider, "local");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let source = r#"
[entities.post]
primary_key = "id"

[entities.post.columns]
title = { provider = "missing", destination = "idx" }
"#;
        let err = Settings::from_toml(source).unwrap_err();
        assert!(err.to_string().contains("unknown provider missing"));
    }

    #[test]
    fn test_secrets_redacted_on_serialize() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("<redacted>"));
    }

    #[test]
    fn test_names_keep_their_case() {
        let source = r#"
[providers.Search]
kind = "elasticsearch"
url = "http://localhost:9200"

[entities.Post]
primary_key = "postId"

[entities.Post.columns]
bodyText = { provider = "Search", destination = "post_index" }
"#;
        let settings = Settings::from_toml(source).unwrap();
        assert!(settings.providers.contains_key("Search"));

        let post = &settings.entities["Post"];
        assert_eq!(post.pk(), PkSpec::string("postId"));
        assert_eq!(post.columns["bodyText"].provider, "Search");
    }

    #[test]
    fn test_load_keeps_case_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fts.toml");
        std::fs::write(
            &path,
            r#"
[providers.Local]
kind = "tantivy"

[entities.BlogPost]
primary_key = "id"

[entities.BlogPost.columns]
headLine = { provider = "Local", destination = "posts" }
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.entities["BlogPost"].columns["headLine"].provider, "Local");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = Settings::load(Some("/nonexistent/fts.toml")).unwrap_err();
        assert!(matches!(err, FtsError::Config(_)));
    }

    #[test]
    fn test_env_layer_folds_onto_existing_keys() {
        let mut base: toml::Table = r#"
[providers.Search]
kind = "elasticsearch"
url = "http://localhost:9200"
"#
        .parse()
        .unwrap();
        let env: toml::Table = r#"
log_level = "warn"

[providers.search]
url = "http://search:9200"
"#
        .parse()
        .unwrap();

        merge_env(&mut base, env);

        assert_eq!(base["log_level"].as_str(), Some("warn"));
        assert!(!base["providers"].as_table().unwrap().contains_key("search"));
        let search = &base["providers"]["Search"];
        assert_eq!(search["url"].as_str(), Some("http://search:9200"));
        assert_eq!(search["kind"].as_str(), Some("elasticsearch"));
    }

    #[test]
    fn test_file_layers_merge_deeply() {
        let mut base: toml::Table = "[providers.a]\nkind = \"tantivy\"\n".parse().unwrap();
        let overlay: toml::Table = "log_level = \"trace\"\n[providers.B]\nkind = \"tantivy\"\n"
            .parse()
            .unwrap();
        merge_tables(&mut base, overlay);

        let providers = base["providers"].as_table().unwrap();
        assert!(providers.contains_key("a"));
        assert!(providers.contains_key("B"));
        assert_eq!(base["log_level"].as_str(), Some("trace"));
    }

    #[test]
    fn test_mutation_kind_serialization() {
        let json = serde_json::to_string(&MutationKind::Upsert).unwrap();
        assert_eq!(json, "\"upsert\"");
        assert_eq!(MutationKind::Delete.as_str(), "delete");
    }
}
