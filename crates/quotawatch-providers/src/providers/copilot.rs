//! GitHub Copilot - `/copilot_internal/user`
//!
//! Quotas come as a map of optional entries sharing one reset date.
//! Copilot reports `percent_remaining`, which the summary inverts.

use crate::client::{decode, fetch_body, redact_secret, HttpConfig, QuotaClient};
use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quotawatch_core::{Provider, QuotaReading, Snapshot};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, instrument};

/// GitHub API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const USER_PATH: &str = "/copilot_internal/user";

/// Body of `GET /copilot_internal/user`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopilotResponse {
    /// GitHub login
    #[serde(default)]
    pub login: Option<String>,
    /// Plan name (e.g. "individual_pro")
    #[serde(default)]
    pub copilot_plan: Option<String>,
    /// Reset date, `YYYY-MM-DD`
    #[serde(default)]
    pub quota_reset_date: Option<String>,
    /// Reset instant, RFC 3339
    #[serde(default)]
    pub quota_reset_date_utc: Option<String>,
    /// Quotas by name; null entries are skipped
    #[serde(default)]
    pub quota_snapshots: BTreeMap<String, Option<CopilotQuota>>,
}

/// One Copilot quota
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopilotQuota {
    /// Allowance for the month
    #[serde(default)]
    pub entitlement: f64,
    /// Allowance left
    #[serde(default)]
    pub remaining: f64,
    /// Percent of the allowance left
    #[serde(default)]
    pub percent_remaining: f64,
    /// No cap applies
    #[serde(default)]
    pub unlimited: bool,
    /// Requests beyond the entitlement
    #[serde(default)]
    pub overage_count: f64,
    /// Whether overage is billed rather than blocked
    #[serde(default)]
    pub overage_permitted: bool,
    /// Provider-side quota identifier
    #[serde(default)]
    pub quota_id: Option<String>,
}

impl CopilotResponse {
    /// Names of the non-null quotas, sorted
    #[must_use]
    pub fn active_quota_names(&self) -> Vec<&str> {
        self.quota_snapshots
            .iter()
            .filter(|(_, entry)| entry.is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Shared reset instant, if present and parseable
    #[must_use]
    pub fn reset_date(&self) -> Option<DateTime<Utc>> {
        if let Some(utc) = self.quota_reset_date_utc.as_deref().filter(|s| !s.is_empty()) {
            if let Ok(dt) = DateTime::parse_from_rfc3339(utc) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(utc, "%Y-%m-%dT%H:%M:%S%.3fZ") {
                return Some(naive.and_utc());
            }
        }
        self.quota_reset_date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// Normalize into a snapshot
    #[must_use]
    pub fn to_snapshot(&self, captured_at: DateTime<Utc>) -> Snapshot {
        let reset = self.reset_date();
        let mut snapshot = Snapshot::new(Provider::Copilot, captured_at);
        snapshot.plan = self.copilot_plan.clone().filter(|p| !p.is_empty());

        for (name, entry) in &self.quota_snapshots {
            let Some(quota) = entry else { continue };
            let mut reading = if quota.unlimited {
                QuotaReading::unlimited(name.as_str())
            } else {
                QuotaReading::from_remaining(name.as_str(), quota.entitlement, quota.remaining)
                    .with_percent_remaining(quota.percent_remaining)
            };
            reading.resets_at = reset;
            snapshot.readings.push(reading);
        }
        snapshot
    }
}

/// Client for the Copilot internal user API
pub struct CopilotClient {
    http: reqwest::Client,
    config: HttpConfig,
    token: SecretString,
}

impl fmt::Debug for CopilotClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopilotClient")
            .field("token", &redact_secret(self.token.expose_secret()))
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl CopilotClient {
    /// Create a client against api.github.com
    pub fn new(token: SecretString) -> Result<Self> {
        Self::with_config(token, HttpConfig::new(DEFAULT_BASE_URL))
    }

    /// Create a client with custom connection settings
    pub fn with_config(token: SecretString, config: HttpConfig) -> Result<Self> {
        Ok(Self {
            http: config.build_client()?,
            config,
            token,
        })
    }
}

#[async_trait::async_trait]
impl QuotaClient for CopilotClient {
    fn provider(&self) -> Provider {
        Provider::Copilot
    }

    #[instrument(skip(self), fields(provider = "copilot"))]
    async fn fetch_snapshot(&self, captured_at: DateTime<Utc>) -> Result<Snapshot> {
        debug!(token = %redact_secret(self.token.expose_secret()), "Fetching Copilot quotas");

        let request = self
            .http
            .get(self.config.url(USER_PATH))
            .bearer_auth(self.token.expose_secret());
        let body = fetch_body(request).await?;
        let response: CopilotResponse = decode(&body)?;

        debug!(
            active_quotas = ?response.active_quota_names(),
            plan = ?response.copilot_plan,
            "Copilot quotas fetched"
        );

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
    use axum::routing::get;
    use axum::Router;
    use chrono::TimeZone;

    const FIXTURE: &str = r#"{
        "login": "octocat",
        "copilot_plan": "individual_pro",
        "access_type_sku": "plus_monthly_subscriber_quota",
        "quota_reset_date": "2026-03-01",
        "quota_reset_date_utc": "2026-03-01T00:00:00.000Z",
        "quota_snapshots": {
            "premium_interactions": {
                "entitlement": 1500, "overage_count": 0, "overage_permitted": false,
                "percent_remaining": 78.4, "quota_id": "premium_interactions",
                "quota_remaining": 1176.0, "remaining": 1176, "unlimited": false
            },
            "chat": {
                "entitlement": 0, "overage_count": 0, "overage_permitted": false,
                "percent_remaining": 100.0, "quota_id": "chat",
                "quota_remaining": 0.0, "remaining": 0, "unlimited": true
            },
            "completions": null
        }
    }"#;

    fn march() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_to_snapshot() {
        let response: CopilotResponse = serde_json::from_str(FIXTURE).unwrap();
        assert_eq!(response.active_quota_names(), vec!["chat", "premium_interactions"]);

        let snapshot = response.to_snapshot(Utc::now());
        assert_eq!(snapshot.plan.as_deref(), Some("individual_pro"));
        assert_eq!(snapshot.quota_names(), vec!["chat", "premium_interactions"]);

        let premium = snapshot.reading("premium_interactions").unwrap();
        assert_eq!(premium.limit, 1500.0);
        assert_eq!(premium.used, 324.0);
        assert_eq!(premium.resets_at, Some(march()));
        let pct = premium.usage_percent().unwrap();
        assert!((pct - 21.6).abs() < 1e-9);

        let chat = snapshot.reading("chat").unwrap();
        assert!(chat.unlimited);
        assert_eq!(chat.resets_at, Some(march()));
    }

    #[test]
    fn test_reset_date_formats() {
        let mut response = CopilotResponse {
            quota_reset_date_utc: Some("2026-03-01T00:00:00Z".to_string()),
            ..CopilotResponse::default()
        };
        assert_eq!(response.reset_date(), Some(march()));

        response.quota_reset_date_utc = Some("2026-03-01T00:00:00.000Z".to_string());
        assert_eq!(response.reset_date(), Some(march()));

        response.quota_reset_date_utc = Some("garbage".to_string());
        assert_eq!(response.reset_date(), None);

        response.quota_reset_date_utc = None;
        response.quota_reset_date = Some("2026-03-01".to_string());
        assert_eq!(response.reset_date(), Some(march()));
    }

    #[test]
    fn test_empty_snapshot_map() {
        let response: CopilotResponse = serde_json::from_str(r#"{"login": "octocat"}"#).unwrap();
        let snapshot = response.to_snapshot(Utc::now());
        assert!(snapshot.readings.is_empty());
        assert!(snapshot.plan.is_none());
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let router = Router::new().route(USER_PATH, get(|| async { FIXTURE }));
        let base = serve(router).await;

        let client = CopilotClient::with_config(
            SecretString::from("ghu_abcdefghijklmnop".to_string()),
            HttpConfig::new(&base),
        )
        .unwrap();
        let snapshot = client.fetch_snapshot(Utc::now()).await.unwrap();
        assert_eq!(snapshot.readings.len(), 2);
        assert!(snapshot.raw_json.is_some());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let router = Router::new().route(USER_PATH, get(|| async { "{not json" }));
        let base = serve(router).await;

        let client = CopilotClient::with_config(
            SecretString::from("ghu_abcdefghijklmnop".to_string()),
            HttpConfig::new(&base),
        )
        .unwrap();
        let err = client.fetch_snapshot(Utc::now()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
