//! Shared plumbing for the HTTP providers.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};

use fts_types::ProviderError;

/// Build a client with the configured request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Http(e.to_string()))
}

/// Parse a base URL.
pub(crate) fn parse_base(url: &str) -> Result<Url, ProviderError> {
    Url::parse(url).map_err(|e| ProviderError::Http(format!("invalid url {url:?}: {e}")))
}

/// Append percent-encoded path segments to a base URL.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ProviderError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ProviderError::Http(format!("url {base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turn a non-success response into [`ProviderError::Status`].
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn is_not_found(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND
}

pub(crate) fn transport(e: reqwest::Error) -> ProviderError {
    ProviderError::Http(e.to_string())
}
