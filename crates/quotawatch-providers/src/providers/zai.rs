//! Z.ai - `/api/monitor/usage/quota/limit`
//!
//! The API key goes in the `Authorization` header as-is (no `Bearer`).
//! Limits arrive as a list keyed by `type`; reset times are epoch
//! milliseconds.

use crate::client::{decode, fetch_body, redact_secret, HttpConfig, QuotaClient};
use crate::error::{ProviderError, Result};
use chrono::{DateTime, Utc};
use quotawatch_core::{Provider, QuotaReading, Snapshot};
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

/// Z.ai API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.z.ai";

const QUOTA_PATH: &str = "/api/monitor/usage/quota/limit";

/// Body of the quota-limit endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaiResponse {
    /// Application status code
    #[serde(default)]
    pub code: Option<i64>,
    /// Application status message
    #[serde(default)]
    pub msg: Option<String>,
    /// False when the request was rejected at the application level
    #[serde(default = "default_success")]
    pub success: bool,
    /// Payload; absent on failure
    #[serde(default)]
    pub data: Option<ZaiData>,
}

fn default_success() -> bool {
    true
}

/// Payload of a successful response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZaiData {
    /// Limits, one per type
    #[serde(default)]
    pub limits: Vec<ZaiLimit>,
}

/// One Z.ai limit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZaiLimit {
    /// `TOKENS_LIMIT`, `TIME_LIMIT`, ...
    #[serde(rename = "type")]
    pub limit_type: String,
    /// Capacity for the window
    #[serde(default)]
    pub usage: f64,
    /// Consumed so far
    #[serde(default)]
    pub current_value: f64,
    /// Capacity left
    #[serde(default)]
    pub remaining: Option<f64>,
    /// Percent used
    #[serde(default)]
    pub percentage: Option<f64>,
    /// Window end, epoch milliseconds
    #[serde(default)]
    pub next_reset_time: Option<i64>,
}

impl ZaiLimit {
    /// Quota name for this limit type
    #[must_use]
    pub fn quota_name(&self) -> String {
        match self.limit_type.as_str() {
            "TOKENS_LIMIT" => "tokens".to_string(),
            "TIME_LIMIT" => "time".to_string(),
            other => other.to_ascii_lowercase(),
        }
    }

    fn reading(&self) -> QuotaReading {
        let mut reading = QuotaReading::new(self.quota_name(), self.usage, self.current_value);
        reading.resets_at = self
            .next_reset_time
            .and_then(DateTime::<Utc>::from_timestamp_millis);
        reading
    }
}

impl ZaiResponse {
    /// Normalize into a snapshot; an application-level failure is an error
    pub fn to_snapshot(&self, captured_at: DateTime<Utc>) -> Result<Snapshot> {
        if !self.success {
            return Err(ProviderError::InvalidResponse(format!(
                "z.ai reported failure: code={} msg={}",
                self.code.map_or_else(|| "?".to_string(), |c| c.to_string()),
                self.msg.as_deref().unwrap_or("")
            )));
        }
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| ProviderError::InvalidResponse("missing data".to_string()))?;

        let mut snapshot = Snapshot::new(Provider::Zai, captured_at);
        snapshot.readings = data.limits.iter().map(ZaiLimit::reading).collect();
        Ok(snapshot)
    }
}

/// Client for the Z.ai quota API
pub struct ZaiClient {
    http: reqwest::Client,
    config: HttpConfig,
    api_key: SecretString,
}

impl fmt::Debug for ZaiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZaiClient")
            .field("api_key", &redact_secret(self.api_key.expose_secret()))
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl ZaiClient {
    /// Create a client against the public API
    pub fn new(api_key: SecretString) -> Result<Self> {
        Self::with_config(api_key, HttpConfig::new(DEFAULT_BASE_URL))
    }

    /// Create a client with custom connection settings
    pub fn with_config(api_key: SecretString, config: HttpConfig) -> Result<Self> {
        Ok(Self {
            http: config.build_client()?,
            config,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl QuotaClient for ZaiClient {
    fn provider(&self) -> Provider {
        Provider::Zai
    }

    #[instrument(skip(self), fields(provider = "zai"))]
    async fn fetch_snapshot(&self, captured_at: DateTime<Utc>) -> Result<Snapshot> {
        debug!(key = %redact_secret(self.api_key.expose_secret()), "Fetching Z.ai quotas");

        let request = self
            .http
            .get(self.config.url(QUOTA_PATH))
            .header(AUTHORIZATION, self.api_key.expose_secret());
        let body = fetch_body(request).await?;
        let response: ZaiResponse = decode(&body)?;

        let mut snapshot = response.to_snapshot(captured_at)?;
        snapshot.raw_json = Some(body);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;

    const FIXTURE: &str = r#"{
        "code": 200,
        "msg": "Operation successful",
        "success": true,
        "data": {
            "limits": [
                {"type": "TOKENS_LIMIT", "unit": 3, "number": 5, "usage": 40000000,
                 "currentValue": 1250000, "remaining": 38750000, "percentage": 3,
                 "nextResetTime": 1770638400000},
                {"type": "TIME_LIMIT", "unit": 5, "number": 1, "usage": 100,
                 "currentValue": 7, "remaining": 93, "percentage": 7}
            ]
        }
    }"#;

    #[test]
    fn test_to_snapshot() {
        let response: ZaiResponse = serde_json::from_str(FIXTURE).unwrap();
        let snapshot = response.to_snapshot(Utc::now()).unwrap();

        assert_eq!(snapshot.provider, Provider::Zai);
        assert_eq!(snapshot.quota_names(), vec!["tokens", "time"]);

        let tokens = snapshot.reading("tokens").unwrap();
        assert_eq!(tokens.limit, 40_000_000.0);
        assert_eq!(tokens.used, 1_250_000.0);
        assert_eq!(
            tokens.resets_at,
            DateTime::<Utc>::from_timestamp_millis(1_770_638_400_000)
        );
        assert!(snapshot.reading("time").unwrap().resets_at.is_none());
    }

    #[test]
    fn test_unknown_limit_type_is_lowercased() {
        let limit = ZaiLimit {
            limit_type: "MCP_LIMIT".to_string(),
            usage: 1.0,
            current_value: 0.0,
            remaining: None,
            percentage: None,
            next_reset_time: None,
        };
        assert_eq!(limit.quota_name(), "mcp_limit");
    }

    #[test]
    fn test_failure_response_is_invalid() {
        let json = r#"{"code": 1001, "msg": "token expired", "success": false}"#;
        let response: ZaiResponse = serde_json::from_str(json).unwrap();
        let err = response.to_snapshot(Utc::now()).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(ref m) if m.contains("token expired")));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_sends_raw_key() {
        let router = Router::new().route(
            QUOTA_PATH,
            get(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("zai-key-abcdef") => (StatusCode::OK, FIXTURE),
                    _ => (StatusCode::FORBIDDEN, ""),
                }
            }),
        );
        let base = serve(router).await;

        let client = ZaiClient::with_config(
            SecretString::from("zai-key-abcdef".to_string()),
            HttpConfig::new(&base),
        )
        .unwrap();
        let snapshot = client.fetch_snapshot(Utc::now()).await.unwrap();
        assert_eq!(snapshot.readings.len(), 2);

        let wrong = ZaiClient::with_config(
            SecretString::from("other-key-999".to_string()),
            HttpConfig::new(&base),
        )
        .unwrap();
        let err = wrong.fetch_snapshot(Utc::now()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Forbidden));
    }
}
