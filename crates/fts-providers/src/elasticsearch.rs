//! Elasticsearch / OpenSearch provider over the REST API.
//!
//! Both engines share the document and `_search` endpoints used here, so a
//! single client serves either; the flavor only shows up in logs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use fts_core::{Document, SearchHit, SearchOptions, SearchProvider};
use fts_types::{HttpProviderSettings, ProviderError};

use crate::http::{build_client, check_status, endpoint, is_not_found, parse_base, transport};

/// Which engine the cluster runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Elasticsearch,
    OpenSearch,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Elasticsearch => "elasticsearch",
            Flavor::OpenSearch => "opensearch",
        }
    }
}

/// Connection settings for a cluster.
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Base URL (e.g., "http://localhost:9200")
    pub url: String,

    pub flavor: Flavor,

    /// Basic auth user
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<SecretString>,

    /// API key sent as `Authorization: ApiKey ...`
    pub api_key: Option<SecretString>,

    /// Request timeout
    pub timeout: Duration,
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>, flavor: Flavor) -> Self {
        Self {
            url: url.into(),
            flavor,
            username: None,
            password: None,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Build from configuration settings.
    pub fn from_settings(settings: &HttpProviderSettings, flavor: Flavor) -> Self {
        Self {
            url: settings.url.clone(),
            flavor,
            username: settings.username.clone(),
            password: settings.password.clone().map(SecretString::from),
            api_key: settings.api_key.clone().map(SecretString::from),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
}

/// `match` query on one column; marker options are merged into the match
/// clause next to `query`.
pub fn build_search_body(column: &str, query: &str, options: &SearchOptions) -> Value {
    let mut clause = Map::new();
    clause.insert("query".to_string(), Value::String(query.to_string()));
    for (key, value) in options {
        clause.insert(key.clone(), value.clone());
    }

    let mut matcher = Map::new();
    matcher.insert(column.to_string(), Value::Object(clause));
    json!({ "query": { "match": matcher } })
}

/// Extract `hits.hits[]._id` from a search response.
pub fn parse_search_hits(body: Value) -> Result<Vec<SearchHit>, ProviderError> {
    let response: SearchResponse =
        serde_json::from_value(body).map_err(|e| ProviderError::Parse(e.to_string()))?;
    Ok(response
        .hits
        .hits
        .into_iter()
        .map(|hit| SearchHit::new(hit.id))
        .collect())
}

/// Provider backed by an Elasticsearch or OpenSearch cluster.
pub struct ElasticsearchProvider {
    id: String,
    client: Client,
    base: Url,
    config: ElasticsearchConfig,
}

impl ElasticsearchProvider {
    pub fn new(id: impl Into<String>, config: ElasticsearchConfig) -> Result<Self, ProviderError> {
        let client = build_client(config.timeout)?;
        let base = parse_base(&config.url)?;
        let id = id.into();

        info!(provider = %id, flavor = config.flavor.as_str(), url = %base, "Created search cluster provider");

        Ok(Self {
            id,
            client,
            base,
            config,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(api_key) = &self.config.api_key {
            return request.header("Authorization", format!("ApiKey {}", api_key.expose_secret()));
        }
        match &self.config.username {
            Some(username) => request.basic_auth(
                username,
                self.config.password.as_ref().map(|p| p.expose_secret().to_string()),
            ),
            None => request,
        }
    }
}

#[async_trait]
impl SearchProvider for ElasticsearchProvider {
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
        let url = endpoint(&self.base, &[destination, "_search"])?;
        let body = build_search_body(column, query, options);

        let response = self
            .authorize(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let hits = parse_search_hits(body)?;

        debug!(
            provider = %self.id,
            index = destination,
            column,
            hits = hits.len(),
            "Cluster search complete"
        );
        Ok(hits)
    }

    async fn upsert_document(
        &self,
        destination: &str,
        id: &str,
        fields: &Document,
    ) -> Result<(), ProviderError> {
        let url = endpoint(&self.base, &[destination, "_doc", id])?;

        let response = self
            .authorize(self.client.put(url))
            .json(fields)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;

        debug!(provider = %self.id, index = destination, id, "Indexed document");
        Ok(())
    }

    async fn delete_document(&self, destination: &str, id: &str) -> Result<(), ProviderError> {
        let url = endpoint(&self.base, &[destination, "_doc", id])?;

        let response = self
            .authorize(self.client.delete(url))
            .send()
            .await
            .map_err(transport)?;

        if is_not_found(response.status()) {
            warn!(provider = %self.id, index = destination, id, "Document already absent");
            return Ok(());
        }
        check_status(response).await?;

        debug!(provider = %self.id, index = destination, id, "Deleted document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_search_body() {
        let mut options = SearchOptions::new();
        options.insert("fuzziness".to_string(), json!("AUTO"));

        let body = build_search_body("content", "alpha beta", &options);
        assert_eq!(
            body,
            json!({ "query": { "match": { "content": { "query": "alpha beta", "fuzziness": "AUTO" } } } })
        );
    }

    #[test]
    fn test_parse_search_hits() {
        let hits = parse_search_hits(json!({
            "took": 3,
            "hits": { "total": { "value": 2 }, "hits": [{ "_id": "1", "_score": 1.2 }, { "_id": "7" }] }
        }))
        .unwrap();
        assert_eq!(hits, vec![SearchHit::new("1"), SearchHit::new("7")]);

        assert!(matches!(
            parse_search_hits(json!({ "error": "boom" })),
            Err(ProviderError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_search_against_cluster() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/_search"))
            .and(body_json(json!({ "query": { "match": { "content": { "query": "alpha" } } } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": { "hits": [{ "_id": "3" }] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = ElasticsearchProvider::new(
            "es",
            ElasticsearchConfig::new(server.uri(), Flavor::Elasticsearch),
        )
        .unwrap();

        let hits = provider
            .search("posts", "content", "alpha", &SearchOptions::new())
            .await
            .unwrap();
        assert_eq!(hits, vec![SearchHit::new("3")]);
    }

    #[tokio::test]
    async fn test_upsert_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/posts/_doc/5"))
            .and(header("Authorization", "ApiKey secret"))
            .and(body_json(json!({ "title": "T" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let provider = ElasticsearchProvider::new(
            "os",
            ElasticsearchConfig::new(server.uri(), Flavor::OpenSearch).with_api_key("secret"),
        )
        .unwrap();

        let mut fields = Document::new();
        fields.insert("title".to_string(), json!("T"));
        provider.upsert_document("posts", "5", &fields).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_document() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/posts/_doc/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = ElasticsearchProvider::new(
            "es",
            ElasticsearchConfig::new(server.uri(), Flavor::Elasticsearch),
        )
        .unwrap();
        provider.delete_document("posts", "9").await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("cluster down"))
            .mount(&server)
            .await;

        let provider = ElasticsearchProvider::new(
            "es",
            ElasticsearchConfig::new(server.uri(), Flavor::Elasticsearch),
        )
        .unwrap();

        let err = provider
            .search("posts", "content", "alpha", &SearchOptions::new())
            .await
            .unwrap_err();
        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "cluster down");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_config_from_settings() {
        let settings = HttpProviderSettings {
            url: "http://localhost:9200".to_string(),
            username: Some("elastic".to_string()),
            password: Some("changeme".to_string()),
            api_key: None,
            timeout_secs: 5,
        };
        let config = ElasticsearchConfig::from_settings(&settings, Flavor::OpenSearch);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.password.unwrap().expose_secret(), "changeme");
        assert_eq!(config.flavor.as_str(), "opensearch");
    }
}
