//! JSON API
//!
//! Serves provider summaries, cycle history, raw snapshots and sessions
//! straight from the store. The only write is the per-provider polling
//! toggle.

pub mod health;
pub mod providers;
pub mod response;
pub mod sessions;


use axum::Router;
use quotawatch_core::Provider;
use quotawatch_providers::PollingSwitch;
use quotawatch_store::SqliteStore;
use std::collections::HashMap;
use std::sync::Arc;

pub use health::health_routes;
pub use providers::providers_routes;
pub use sessions::sessions_routes;

/// Shared handler state
#[derive(Clone)]
pub struct ApiState {
    store: SqliteStore,
    enabled: Arc<[Provider]>,
    switches: Arc<HashMap<Provider, PollingSwitch>>,
}

impl ApiState {
    /// Create state over `store`; `enabled` lists the providers being polled
    pub fn new(store: SqliteStore, enabled: Vec<Provider>) -> Self {
        let switches = enabled
            .iter()
            .map(|&provider| (provider, PollingSwitch::default()))
            .collect();
        Self {
            store,
            enabled: enabled.into(),
            switches: Arc::new(switches),
        }
    }

    /// Polling switch shared with the agent for `provider`
    pub fn polling_switch(&self, provider: Provider) -> Option<&PollingSwitch> {
        self.switches.get(&provider)
    }

    /// Whether an agent polls `provider`
    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.enabled.contains(&provider)
    }
}

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(providers_routes())
        .merge(sessions_routes())
}
