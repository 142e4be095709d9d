//! Shared HTTP plumbing for provider clients

use crate::error::{ProviderError, Result};
use chrono::{DateTime, Utc};
use quotawatch_core::{Provider, Snapshot};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Largest response body accepted from a provider
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A provider that can report its current quota state
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait QuotaClient: Send + Sync {
    /// Provider this client talks to
    fn provider(&self) -> Provider;

    /// Fetch and normalize the provider's quotas, stamped with `captured_at`
    async fn fetch_snapshot(&self, captured_at: DateTime<Utc>) -> Result<Snapshot>;
}

/// Connection settings shared by all provider clients
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Scheme and host, without a trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpConfig {
    /// Create a config for `base_url` with the default timeout
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Join an endpoint path onto the base URL
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("quotawatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to create HTTP client: {e}")))
    }
}

/// Send a request and return the body of a successful response.
///
/// Non-success statuses are mapped to typed errors; bodies are capped at
/// [`MAX_BODY_BYTES`].
pub(crate) async fn fetch_body(request: reqwest::RequestBuilder) -> Result<String> {
    let mut response = request
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = response.status();
    debug!(status = status.as_u16(), "Quota response received");

    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok());
        return Err(status_error(status.as_u16(), retry_after));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?
    {
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(ProviderError::InvalidResponse(format!(
                "response body exceeds {MAX_BODY_BYTES} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }

    if body.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "empty response body".to_string(),
        ));
    }

    String::from_utf8(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Map a non-success HTTP status to an error
pub(crate) fn status_error(status: u16, retry_after: Option<&str>) -> ProviderError {
    match status {
        401 => ProviderError::Unauthorized,
        403 => ProviderError::Forbidden,
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.and_then(|v| v.trim().parse().ok()),
        },
        500..=599 => ProviderError::Server(status),
        _ => ProviderError::UnexpectedStatus(status),
    }
}

/// Decode a JSON body
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Mask a credential for logging.
///
/// Shows the first 4 and last 3 characters; anything shorter than 8
/// characters is masked entirely.
#[must_use]
pub fn redact_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(empty)".to_string();
    }

    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < 8 {
        return "***...***".to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}***...***{tail}")
}
