//! Synthetic - `/v2/quotas`
//!
//! Three quotas: the subscription request budget, the hourly search
//! budget and tool-call discounts. Each carries its own `renewsAt`.

use crate::client::{decode, fetch_body, redact_secret, HttpConfig, QuotaClient};
use crate::error::Result;
use chrono::{DateTime, Utc};
use quotawatch_core::{Provider, QuotaReading, Snapshot};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

/// Synthetic API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.synthetic.new";

const QUOTAS_PATH: &str = "/v2/quotas";

// ============================================================================
// Response types
// ============================================================================

/// Body of `GET /v2/quotas`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticResponse {
    /// Subscription request budget
    pub subscription: SyntheticQuota,
    /// Search budgets
    #[serde(default)]
    pub search: Option<SyntheticSearch>,
    /// Tool-call discount budget
    #[serde(default)]
    pub tool_call_discounts: Option<SyntheticQuota>,
}

/// Wrapper around the hourly search budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticSearch {
    /// Hourly search quota
    pub hourly: SyntheticQuota,
}

/// One Synthetic quota
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticQuota {
    /// Requests allowed per cycle
    pub limit: f64,
    /// Requests used so far
    pub requests: f64,
    /// When the quota renews
    #[serde(default)]
    pub renews_at: Option<DateTime<Utc>>,
}

impl SyntheticQuota {
    fn reading(&self, name: &str) -> QuotaReading {
        let mut reading = QuotaReading::new(name, self.limit, self.requests);
        reading.resets_at = self.renews_at;
        reading
    }
}

impl SyntheticResponse {
    /// Normalize into a snapshot
    #[must_use]
    pub fn to_snapshot(&self, captured_at: DateTime<Utc>) -> Snapshot {
        let mut snapshot = Snapshot::new(Provider::Synthetic, captured_at)
            .with_reading(self.subscription.reading("subscription"));
        if let Some(search) = &self.search {
            snapshot = snapshot.with_reading(search.hourly.reading("search"));
        }
        if let Some(toolcall) = &self.tool_call_discounts {
            snapshot = snapshot.with_reading(toolcall.reading("toolcall"));
        }
        snapshot
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client for the Synthetic quota API
pub struct SyntheticClient {
    http: reqwest::Client,
    config: HttpConfig,
    api_key: SecretString,
}

impl fmt::Debug for SyntheticClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticClient")
            .field("api_key", &redact_secret(self.api_key.expose_secret()))
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl SyntheticClient {
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
impl QuotaClient for SyntheticClient {
    fn provider(&self) -> Provider {
        Provider::Synthetic
    }

    #[instrument(skip(self), fields(provider = "synthetic"))]
    async fn fetch_snapshot(&self, captured_at: DateTime<Utc>) -> Result<Snapshot> {
        debug!(key = %redact_secret(self.api_key.expose_secret()), "Fetching Synthetic quotas");

        let request = self
            .http
            .get(self.config.url(QUOTAS_PATH))
            .bearer_auth(self.api_key.expose_secret());
        let body = fetch_body(request).await?;
        let response: SyntheticResponse = decode(&body)?;

        let mut snapshot = response.to_snapshot(captured_at);
        snapshot.raw_json = Some(body);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::test_support::serve;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;

    const FIXTURE: &str = r#"{
        "subscription": {"limit": 1350, "requests": 154.5, "renewsAt": "2026-02-10T12:00:00Z"},
        "search": {"hourly": {"limit": 250, "requests": 12, "renewsAt": "2026-02-09T14:00:00Z"}},
        "toolCallDiscounts": {"limit": 16200, "requests": 400, "renewsAt": "2026-02-10T12:00:00Z"}
    }"#;

    #[test]
    fn test_to_snapshot() {
        let response: SyntheticResponse = serde_json::from_str(FIXTURE).unwrap();
        let captured_at = Utc::now();
        let snapshot = response.to_snapshot(captured_at);

        assert_eq!(snapshot.provider, Provider::Synthetic);
        assert_eq!(snapshot.captured_at, captured_at);
        assert_eq!(
            snapshot.quota_names(),
            vec!["subscription", "search", "toolcall"]
        );

        let sub = snapshot.reading("subscription").unwrap();
        assert_eq!(sub.limit, 1350.0);
        assert_eq!(sub.used, 154.5);
        assert_eq!(
            sub.resets_at.map(|t| t.to_rfc3339()),
            Some("2026-02-10T12:00:00+00:00".to_string())
        );
        assert_eq!(snapshot.reading("search").unwrap().remaining(), 238.0);
    }

    #[test]
    fn test_optional_sections() {
        let json = r#"{"subscription": {"limit": 100, "requests": 1}}"#;
        let response: SyntheticResponse = serde_json::from_str(json).unwrap();
        let snapshot = response.to_snapshot(Utc::now());
        assert_eq!(snapshot.quota_names(), vec!["subscription"]);
        assert!(snapshot.readings[0].resets_at.is_none());
    }

    #[tokio::test]
    async fn test_fetch_snapshot_sends_bearer_key() {
        let router = Router::new().route(
            QUOTAS_PATH,
            get(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Bearer syn_test_key_123") => (StatusCode::OK, FIXTURE),
                    _ => (StatusCode::UNAUTHORIZED, ""),
                }
            }),
        );
        let base = serve(router).await;

        let client = SyntheticClient::with_config(
            SecretString::from("syn_test_key_123".to_string()),
            HttpConfig::new(&base),
        )
        .unwrap();
        let snapshot = client.fetch_snapshot(Utc::now()).await.unwrap();
        assert_eq!(snapshot.readings.len(), 3);
        assert!(snapshot.raw_json.unwrap().contains("toolCallDiscounts"));

        let wrong = SyntheticClient::with_config(
            SecretString::from("wrong_key_000".to_string()),
            HttpConfig::new(&base),
        )
        .unwrap();
        let err = wrong.fetch_snapshot(Utc::now()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unauthorized));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client =
            SyntheticClient::new(SecretString::from("syn_abcdefghijklmnop".to_string())).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("abcdefghijklmnop"));
        assert!(debug.contains("syn_***...***nop"));
    }
}
