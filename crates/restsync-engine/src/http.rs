//! HTTP client capability consumed by the extractor.
//!
//! [`HttpClient`] executes one request and returns status and body. TLS,
//! timeouts, and credentials belong to the implementation; the engine only
//! classifies status codes. [`ReqwestClient`] is the production client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Url;

use crate::config::types::{AuthConfig, ClientConfig};

/// One request against the source API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    /// Path relative to the client's base URL.
    pub path: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(path: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            method: reqwest::Method::GET,
            path: path.into(),
            params,
            headers: Vec::new(),
        }
    }

    /// Value of the first query parameter named `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status, body, and any `Retry-After` hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub retry_after_ms: Option<u64>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after_ms: None,
        }
    }
}

/// A request that produced no HTTP response at all.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Executes requests against the source API.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed [`HttpClient`] scoped to one base URL and credential.
pub struct ReqwestClient {
    base_url: Url,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Build a client from the pipeline's `client` section.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the TLS backend
    /// cannot be initialized.
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| anyhow::anyhow!("invalid base_url '{}': {e}", config.base_url))?;

        if !config.verify_tls {
            tracing::warn!(
                base_url = %base_url,
                "TLS certificate verification disabled for source API"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        let bearer_token = match &config.auth {
            AuthConfig::None => None,
            AuthConfig::Bearer { token } => Some(token.clone()),
        };

        Ok(Self {
            base_url,
            bearer_token,
            client,
        })
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Other(format!("invalid path '{path}': {e}")))
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .query(&request.params);
        if let Some(ref token) = self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let retry_after_ms = retry_after_ms(response.headers());
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(HttpResponse {
            status,
            body,
            retry_after_ms,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Parse a delta-seconds `Retry-After` header.
fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs: u64 = raw.trim().parse().ok()?;
    u64::try_from(Duration::from_secs(secs).as_millis()).ok()
}
