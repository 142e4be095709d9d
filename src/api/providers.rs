//! Provider quota endpoints
//!
//! GET /api/v1/providers                              - Providers and their last poll
//! GET /api/v1/providers/:provider/summary            - Summary of every quota
//! GET /api/v1/providers/:provider/summary/:quota     - Summary of one quota
//! GET /api/v1/providers/:provider/cycles/:quota      - Active cycle and history
//! GET /api/v1/providers/:provider/current            - Latest raw snapshot
//! GET /api/v1/providers/:provider/polling            - Whether the agent is fetching
//! PUT /api/v1/providers/:provider/polling            - Pause or resume the agent

use super::response::{ok, ApiError, ApiResult};
use super::ApiState;
use axum::extract::{Extension, Path};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use quotawatch_core::{display_name, Cycle, Provider, Snapshot, Tracker, UsageSummary};
use quotawatch_providers::PollingSwitch;
use quotawatch_store::SqliteStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Provider listing entry
#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub provider: Provider,
    pub label: &'static str,
    pub enabled: bool,
    /// Enabled and not paused
    pub polling: bool,
    pub last_poll: Option<DateTime<Utc>>,
    pub plan: Option<String>,
}

/// Summary of one quota with its display name
#[derive(Debug, Serialize)]
pub struct QuotaSummary {
    pub display_name: String,
    #[serde(flatten)]
    pub summary: UsageSummary,
}

/// Summaries of every quota a provider reported in its latest snapshot
#[derive(Debug, Serialize)]
pub struct ProviderSummary {
    pub provider: Provider,
    pub label: &'static str,
    pub plan: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub quotas: Vec<QuotaSummary>,
}

/// Cycle history of one quota
#[derive(Debug, Serialize)]
pub struct CycleHistory {
    pub quota_name: String,
    pub display_name: String,
    pub active: Option<Cycle>,
    /// Closed cycles, oldest first
    pub history: Vec<Cycle>,
}

/// Polling state of one provider
#[derive(Debug, Serialize)]
pub struct PollingStatus {
    pub provider: Provider,
    pub polling: bool,
}

/// Body of a polling toggle request
#[derive(Debug, Deserialize)]
pub struct PollingRequest {
    pub enabled: bool,
}

/// Read-only tracker over one provider's cycles
fn tracker_for(store: &SqliteStore, provider: Provider) -> Tracker {
    Tracker::new(Arc::new(store.scoped(provider)))
}

/// Summarize one quota
pub async fn load_quota_summary(
    store: &SqliteStore,
    provider: Provider,
    quota: &str,
) -> quotawatch_core::Result<QuotaSummary> {
    let summary = tracker_for(store, provider).usage_summary(quota).await?;
    Ok(QuotaSummary {
        display_name: display_name(provider, quota),
        summary,
    })
}

/// Summarize every quota in the provider's latest snapshot
pub async fn load_provider_summary(
    store: &SqliteStore,
    provider: Provider,
) -> quotawatch_core::Result<ProviderSummary> {
    let latest = store.query_latest_snapshot(provider).await?;
    let tracker = tracker_for(store, provider);

    let mut quotas = Vec::new();
    if let Some(snapshot) = &latest {
        for name in snapshot.quota_names() {
            quotas.push(QuotaSummary {
                display_name: display_name(provider, name),
                summary: tracker.usage_summary(name).await?,
            });
        }
    }

    Ok(ProviderSummary {
        provider,
        label: provider.label(),
        plan: latest.as_ref().and_then(|s| s.plan.clone()),
        captured_at: latest.as_ref().map(|s| s.captured_at),
        quotas,
    })
}

/// Load the active cycle and closed history of one quota
pub async fn load_cycle_history(
    store: &SqliteStore,
    provider: Provider,
    quota: &str,
) -> quotawatch_core::Result<CycleHistory> {
    Ok(CycleHistory {
        quota_name: quota.to_string(),
        display_name: display_name(provider, quota),
        active: store.query_active_cycle(provider, quota).await?,
        history: store.query_cycle_history(provider, quota).await?,
    })
}

fn parse_provider(raw: &str) -> Result<Provider, ApiError> {
    raw.parse().map_err(ApiError::NotFound)
}

async fn list_providers(Extension(state): Extension<ApiState>) -> ApiResult<Vec<ProviderInfo>> {
    let mut providers = Vec::with_capacity(Provider::ALL.len());
    for provider in Provider::ALL {
        let latest = state.store.query_latest_snapshot(provider).await?;
        providers.push(ProviderInfo {
            provider,
            label: provider.label(),
            enabled: state.is_enabled(provider),
            polling: state
                .polling_switch(provider)
                .is_some_and(PollingSwitch::is_enabled),
            last_poll: latest.as_ref().map(|s| s.captured_at),
            plan: latest.and_then(|s| s.plan),
        });
    }
    ok(providers)
}

async fn provider_summary(
    Extension(state): Extension<ApiState>,
    Path(provider): Path<String>,
) -> ApiResult<ProviderSummary> {
    let provider = parse_provider(&provider)?;
    ok(load_provider_summary(&state.store, provider).await?)
}

async fn quota_summary(
    Extension(state): Extension<ApiState>,
    Path((provider, quota)): Path<(String, String)>,
) -> ApiResult<QuotaSummary> {
    let provider = parse_provider(&provider)?;
    ok(load_quota_summary(&state.store, provider, &quota).await?)
}

async fn quota_cycles(
    Extension(state): Extension<ApiState>,
    Path((provider, quota)): Path<(String, String)>,
) -> ApiResult<CycleHistory> {
    let provider = parse_provider(&provider)?;
    ok(load_cycle_history(&state.store, provider, &quota).await?)
}

async fn current_snapshot(
    Extension(state): Extension<ApiState>,
    Path(provider): Path<String>,
) -> ApiResult<Snapshot> {
    let provider = parse_provider(&provider)?;
    let snapshot = state
        .store
        .query_latest_snapshot(provider)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no snapshot recorded for {provider}")))?;
    ok(snapshot)
}

fn switch_for(state: &ApiState, provider: Provider) -> Result<&PollingSwitch, ApiError> {
    state
        .polling_switch(provider)
        .ok_or_else(|| ApiError::NotFound(format!("{provider} is not being polled")))
}

async fn get_polling(
    Extension(state): Extension<ApiState>,
    Path(provider): Path<String>,
) -> ApiResult<PollingStatus> {
    let provider = parse_provider(&provider)?;
    let switch = switch_for(&state, provider)?;
    ok(PollingStatus {
        provider,
        polling: switch.is_enabled(),
    })
}

async fn set_polling(
    Extension(state): Extension<ApiState>,
    Path(provider): Path<String>,
    Json(request): Json<PollingRequest>,
) -> ApiResult<PollingStatus> {
    let provider = parse_provider(&provider)?;
    let switch = switch_for(&state, provider)?;
    switch.set(request.enabled);
    info!(provider = %provider, polling = request.enabled, "Polling toggled");
    ok(PollingStatus {
        provider,
        polling: request.enabled,
    })
}

/// Create provider routes
pub fn providers_routes() -> Router {
    Router::new()
        .route("/api/v1/providers", get(list_providers))
        .route("/api/v1/providers/:provider/summary", get(provider_summary))
        .route(
            "/api/v1/providers/:provider/summary/:quota",
            get(quota_summary),
        )
        .route("/api/v1/providers/:provider/cycles/:quota", get(quota_cycles))
        .route("/api/v1/providers/:provider/current", get(current_snapshot))
        .route(
            "/api/v1/providers/:provider/polling",
            get(get_polling).put(set_polling),
        )
}
