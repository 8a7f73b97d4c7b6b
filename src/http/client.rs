//! Transport client for the modeling API
//!
//! Every call returns an [`EndpointResult`]; HTTP error statuses and
//! transport failures are normalized into the same shape instead of being
//! raised, so the scenario decides control flow from the status alone.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::common::{Error, Result};

use super::types::{error_body, ApiRequest, EndpointResult};

/// Sends one request and returns its normalized result
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request; never fails, see [`EndpointResult`]
    async fn send(&self, request: ApiRequest) -> EndpointResult;

    /// Base URL requests are resolved against
    fn base_url(&self) -> &str;
}

/// `reqwest`-backed transport
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    default_timeout: Duration,
}

impl ApiClient {
    /// Create a client for `base_url` (scheme, host and port, no path)
    pub fn new(base_url: &str, default_timeout: Duration) -> Result<Self> {
        let parsed = reqwest::Url::parse(base_url).map_err(|e| Error::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("archi-smoke/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
            default_timeout,
        })
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn send(&self, request: ApiRequest) -> EndpointResult {
        let url = format!("{}{}", self.base, request.path);
        tracing::debug!(method = %request.method, %url, "sending request");

        let mut builder = self
            .http
            .request(request.method.into(), &url)
            .header(ACCEPT, "application/json")
            .timeout(request.timeout.unwrap_or(self.default_timeout));

        if !request.query.is_empty() {
            builder = builder.query(request.query.pairs());
        }
        if let Some(body) = &request.body {
            // Sets Content-Type: application/json
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(%url, error = %e, "transport failure");
                return EndpointResult::transport_failure(describe_transport_error(&e));
            }
        };

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);

        match response.bytes().await {
            Ok(bytes) => EndpointResult::new(status.as_u16(), decode_body(status, is_json, &bytes)),
            Err(e) => EndpointResult::transport_failure(describe_transport_error(&e)),
        }
    }

    fn base_url(&self) -> &str {
        &self.base
    }
}

/// Turn a raw response body into the JSON value carried by the result
///
/// - Success with a JSON content type: the parsed payload.
/// - Success otherwise: `{"bytes": <length>}`.
/// - Error status: the payload parsed as JSON if possible, else `{"error": ...}`.
pub fn decode_body(status: StatusCode, is_json: bool, bytes: &[u8]) -> Value {
    if status.is_client_error() || status.is_server_error() {
        return serde_json::from_slice(bytes).unwrap_or_else(|_| match status.canonical_reason() {
            Some(reason) => error_body(format!("HTTP {} {reason}", status.as_u16())),
            None => error_body(format!("HTTP {}", status.as_u16())),
        });
    }

    if is_json {
        serde_json::from_slice(bytes)
            .unwrap_or_else(|e| error_body(format!("invalid JSON in response: {e}")))
    } else {
        json!({ "bytes": bytes.len() })
    }
}

/// Error text including the underlying cause chain
fn describe_transport_error(e: &reqwest::Error) -> String {
    let mut message = if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    };
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
