//! Purelymail API client
//!
//! Every Purelymail operation is a `POST` of a JSON object to
//! `<base>/api/v0/<operation>`, authenticated with the `Purelymail-Api-Token`
//! header. Replies are wrapped in an envelope:
//!
//! ```json
//! {"type": "success", "result": {...}}
//! {"type": "error", "code": "...", "message": "..."}
//! ```
//!
//! The client unwraps `result` so tool output embeds it unchanged.

use std::time::Duration;

use reqwest::Url;
use serde_json::{json, Value};

use crate::error::{GatewayError, Result};

/// Production API endpoint
pub const DEFAULT_BASE_URL: &str = "https://purelymail.com";

/// Header carrying the account API token
pub const API_TOKEN_HEADER: &str = "Purelymail-Api-Token";

const API_PREFIX: [&str; 2] = ["api", "v0"];

/// Purelymail client configuration
#[derive(Debug, Clone)]
pub struct PurelymailConfig {
    pub api_key: String,
    pub base_url: String,
    /// Per-request timeout for upstream calls
    pub timeout: Duration,
}

impl PurelymailConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Purelymail API client
pub struct PurelymailClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl PurelymailClient {
    /// Create a new client. Fails if the base URL cannot carry path segments.
    pub fn new(config: PurelymailConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::Config(format!("invalid API base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "API base URL cannot be a base: {}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    /// URL of one API operation, e.g. `https://purelymail.com/api/v0/listUser`.
    ///
    /// The operation name is percent-encoded as a single path segment.
    pub fn endpoint(&self, operation: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Config("API base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .push(operation);
        Ok(url)
    }

    /// Call an operation and return the unwrapped `result`
    pub async fn call(&self, operation: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(operation)?;
        tracing::debug!(operation, url = %url, "Purelymail request");

        let response = self
            .client
            .post(url)
            .header(API_TOKEN_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            tracing::warn!(operation, status = status.as_u16(), "Purelymail request failed");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(json!({}));
        }

        let envelope: Value = serde_json::from_str(&text)?;
        match envelope.get("type").and_then(Value::as_str) {
            Some("success") => Ok(envelope.get("result").cloned().unwrap_or_else(|| json!({}))),
            Some("error") => {
                tracing::warn!(
                    operation,
                    code = envelope.get("code").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
                    "Purelymail rejected request"
                );
                Err(GatewayError::Upstream {
                    status: status.as_u16(),
                    body: text,
                })
            }
            _ => Ok(envelope),
        }
    }
}
