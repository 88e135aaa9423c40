//! Algolia provider over the REST API.
//!
//! Searches go to the DSN host, writes to the primary host. Algolia searches
//! the whole index, so the column is only reported in logs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use fts_core::{Document, SearchHit, SearchOptions, SearchProvider};
use fts_types::{AlgoliaSettings, ProviderError};

use crate::http::{build_client, check_status, endpoint, is_not_found, parse_base, transport};

/// Connection settings for an Algolia application.
#[derive(Debug, Clone)]
pub struct AlgoliaConfig {
    pub app_id: String,
    pub api_key: SecretString,
    pub timeout: Duration,
    /// Host used for queries
    pub search_url: String,
    /// Host used for writes
    pub write_url: String,
}

impl AlgoliaConfig {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        let app_id = app_id.into();
        Self {
            search_url: format!("https://{app_id}-dsn.algolia.net"),
            write_url: format!("https://{app_id}.algolia.net"),
            app_id,
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(30),
        }
    }

    /// Override both hosts (proxies, tests).
    pub fn with_hosts(mut self, search_url: impl Into<String>, write_url: impl Into<String>) -> Self {
        self.search_url = search_url.into();
        self.write_url = write_url.into();
        self
    }

    pub fn from_settings(settings: &AlgoliaSettings) -> Self {
        let mut config = Self::new(settings.app_id.clone(), settings.api_key.clone());
        config.timeout = Duration::from_secs(settings.timeout_secs);
        config
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    hits: Vec<QueryHit>,
}

#[derive(Deserialize)]
struct QueryHit {
    #[serde(rename = "objectID")]
    object_id: String,
}

/// Query body: the query text plus the marker options as search parameters.
pub fn build_query_body(query: &str, options: &SearchOptions) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), Value::String(query.to_string()));
    for (key, value) in options {
        body.insert(key.clone(), value.clone());
    }
    Value::Object(body)
}

/// Record body: the document fields plus `objectID`.
pub fn build_object_body(id: &str, fields: &Document) -> Value {
    let mut body = fields.clone();
    body.insert("objectID".to_string(), Value::String(id.to_string()));
    Value::Object(body)
}

/// Extract `hits[].objectID` from a query response.
pub fn parse_query_hits(body: Value) -> Result<Vec<SearchHit>, ProviderError> {
    let response: QueryResponse =
        serde_json::from_value(body).map_err(|e| ProviderError::Parse(e.to_string()))?;
    Ok(response
        .hits
        .into_iter()
        .map(|hit| SearchHit::new(hit.object_id))
        .collect())
}

/// Provider backed by an Algolia application.
pub struct AlgoliaProvider {
    id: String,
    client: Client,
    search_base: Url,
    write_base: Url,
    config: AlgoliaConfig,
}

impl AlgoliaProvider {
    pub fn new(id: impl Into<String>, config: AlgoliaConfig) -> Result<Self, ProviderError> {
        let client = build_client(config.timeout)?;
        let search_base = parse_base(&config.search_url)?;
        let write_base = parse_base(&config.write_url)?;
        let id = id.into();

        info!(provider = %id, app_id = %config.app_id, "Created Algolia provider");

        Ok(Self {
            id,
            client,
            search_base,
            write_base,
            config,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Algolia-Application-Id", &self.config.app_id)
            .header("X-Algolia-API-Key", self.config.api_key.expose_secret())
    }

    fn object_url(&self, destination: &str, id: &str) -> Result<Url, ProviderError> {
        endpoint(&self.write_base, &["1", "indexes", destination, id])
    }
}

#[async_trait]
impl SearchProvider for AlgoliaProvider {
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
        let url = endpoint(&self.search_base, &["1", "indexes", destination, "query"])?;

        let response = self
            .authorize(self.client.post(url))
            .json(&build_query_body(query, options))
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let hits = parse_query_hits(body)?;

        debug!(
            provider = %self.id,
            index = destination,
            column,
            hits = hits.len(),
            "Algolia search complete"
        );
        Ok(hits)
    }

    async fn upsert_document(
        &self,
        destination: &str,
        id: &str,
        fields: &Document,
    ) -> Result<(), ProviderError> {
        let url = self.object_url(destination, id)?;

        let response = self
            .authorize(self.client.put(url))
            .json(&build_object_body(id, fields))
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;

        debug!(provider = %self.id, index = destination, id, "Saved object");
        Ok(())
    }

    async fn delete_document(&self, destination: &str, id: &str) -> Result<(), ProviderError> {
        let url = self.object_url(destination, id)?;

        let response = self
            .authorize(self.client.delete(url))
            .send()
            .await
            .map_err(transport)?;

        if is_not_found(response.status()) {
            warn!(provider = %self.id, index = destination, id, "Object already absent");
            return Ok(());
        }
        check_status(response).await?;

        debug!(provider = %self.id, index = destination, id, "Deleted object");
        Ok(())
    }
}
