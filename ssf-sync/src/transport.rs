//! JSON-over-HTTP transport
//!
//! Every call returns the decoded JSON body, `None` for an empty response
//! (HTTP 204 or zero-length body), or a [`TransportError`] carrying the status
//! and whatever body the service sent. Bodies that are not JSON are returned
//! as a JSON string so callers can still surface them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use ssf_common::config::ServiceConfig;
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("ssf-sync/", env!("CARGO_PKG_VERSION"));

/// Transport failure
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Non-2xx response
    #[error("{message}")]
    Http {
        status: u16,
        /// User-facing text derived from the body
        message: String,
        /// Raw body (`None` when empty)
        data: Option<Value>,
    },

    /// Connection, TLS or timeout failure
    #[error("Network error: {0}")]
    Network(String),
}

impl TransportError {
    /// Build an HTTP error, deriving the message from the body.
    ///
    /// Prefers `data.message`, then `data.error`, then a bare text body,
    /// then `Request failed (<status>)`.
    pub fn http(status: u16, data: Option<Value>) -> Self {
        let message = data
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| format!("Request failed ({})", status));
        TransportError::Http {
            status,
            message,
            data,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            TransportError::Network(_) => None,
        }
    }
}

fn error_message(data: &Value) -> Option<String> {
    let text = match data {
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| obj.get("error").and_then(Value::as_str)),
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Request/response seam between the engine and the service
///
/// `path` is relative to the configured base URL and starts with `/`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, TransportError>;

    async fn post(&self, path: &str, body: Value) -> Result<Option<Value>, TransportError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    /// Create a transport for the resolved service configuration
    pub fn new(config: &ServiceConfig) -> Result<Self, TransportError> {
        Self::with_timeout(
            &config.base_url,
            config.auth_token.clone(),
            config.request_timeout,
        )
    }

    pub fn with_timeout(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "Sending request");

        let mut builder = self.client.request(method.clone(), &url);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &body {
            // Also sets Content-Type: application/json
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(method = %method, url = %url, error = %e, "Request failed to send");
            TransportError::Network(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!(status = status.as_u16(), "Empty response");
            return Ok(None);
        }

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let data = decode_body(text);

        if !status.is_success() {
            let error = TransportError::http(status.as_u16(), data);
            debug!(status = status.as_u16(), error = %error, "Service returned error");
            return Err(error);
        }

        debug!(status = status.as_u16(), "Response received");
        Ok(data)
    }
}

/// JSON when parsable, otherwise the raw text as a JSON string
fn decode_body(text: String) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(text)),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Option<Value>, TransportError> {
        self.request(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Option<Value>, TransportError> {
        self.request(Method::POST, path, Some(body)).await
    }
}
