//! Server initialization
//!
//! Contains the main `run()` function that starts the agents and the API.

use super::config::AppConfig;
use super::loader::load_config;
use super::validation::validate_config;
use crate::api::{api_router, health_routes, ApiState};
use anyhow::{anyhow, Context, Result};
use axum::Extension;
use chrono::{Duration as ChronoDuration, Utc};
use quotawatch_core::{wait_for_shutdown_signal, Provider, ShutdownController, Tracker};
use quotawatch_providers::{
    Agent, CopilotClient, HttpConfig, QuotaClient, SyntheticClient, ZaiClient,
};
use quotawatch_store::SqliteStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Grace period for agents after the HTTP server stops
const AGENT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the server
pub async fn run() -> Result<()> {
    info!("Starting QuotaWatch v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("Failed to load configuration")?;
    info!("Configuration loaded");

    let enabled = validate_config(&config)?;

    let store = open_store(&config).await?;
    prune_snapshots(&store, config.polling.retention_days).await;

    let shutdown_controller = ShutdownController::new();
    let interval = Duration::from_secs(config.polling.interval_secs);

    let state = ApiState::new(store.clone(), enabled.clone());
    let idle = Duration::from_secs(config.polling.session_idle_secs);

    let mut agent_handles = Vec::new();
    for &provider in &enabled {
        let client = build_client(provider, &config)
            .with_context(|| format!("Failed to create {provider} client"))?;
        let tracker = Arc::new(Tracker::new(Arc::new(store.scoped(provider))));

        let mut agent = Agent::new(client, store.clone(), tracker, interval);
        if let Some(threshold) = config.polling.alert_threshold {
            agent = agent.with_alert_threshold(threshold);
        }
        if !idle.is_zero() {
            agent = agent.with_usage_sessions(idle);
        }
        if let Some(switch) = state.polling_switch(provider).cloned() {
            agent = agent.with_polling_check(move || switch.is_enabled());
        }

        let guard = shutdown_controller.register_task();
        let token = shutdown_controller.token();
        agent_handles.push(tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = agent.run(token).await {
                error!(provider = %provider, error = %e, "Agent stopped with error");
            }
        }));
        info!(provider = %provider, interval_secs = interval.as_secs(), "Agent started");
    }

    let app = api_router()
        .merge(health_routes())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("HTTP server error")?;

    shutdown_controller.shutdown().await;

    info!("Waiting for agents to finish...");
    for handle in agent_handles {
        match tokio::time::timeout(AGENT_SHUTDOWN_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Agent task error: {}", e),
            Err(_) => warn!("Agent shutdown timeout, aborting"),
        }
    }

    info!("QuotaWatch shutdown complete");
    Ok(())
}

/// Open (or create) the SQLite database under the configured data directory
pub async fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    let db_path = config.db_path();
    info!("Database: {}", db_path.display());
    SqliteStore::from_path(&db_path)
        .await
        .context("Failed to open database")
}

async fn prune_snapshots(store: &SqliteStore, retention_days: u32) {
    if retention_days == 0 {
        return;
    }
    let cutoff = Utc::now() - ChronoDuration::days(i64::from(retention_days));
    match store.delete_snapshots_before(cutoff).await {
        Ok(0) => {}
        Ok(deleted) => info!(deleted, retention_days, "Pruned old snapshots"),
        Err(e) => warn!(error = %e, "Failed to prune old snapshots"),
    }
}

/// Build the HTTP client for one provider
pub fn build_client(provider: Provider, config: &AppConfig) -> Result<Arc<dyn QuotaClient>> {
    let settings = config.providers.get(provider);
    let credential = config
        .providers
        .credential(provider)
        .ok_or_else(|| anyhow!("no credential for {provider}"))?;

    let base_url = settings.base_url.clone().unwrap_or_else(|| {
        match provider {
            Provider::Synthetic => quotawatch_providers::providers::synthetic::DEFAULT_BASE_URL,
            Provider::Zai => quotawatch_providers::providers::zai::DEFAULT_BASE_URL,
            Provider::Copilot => quotawatch_providers::providers::copilot::DEFAULT_BASE_URL,
        }
        .to_string()
    });
    let http = HttpConfig::new(base_url).with_timeout(Duration::from_secs(settings.timeout_secs));

    let client: Arc<dyn QuotaClient> = match provider {
        Provider::Synthetic => Arc::new(SyntheticClient::with_config(credential, http)?),
        Provider::Zai => Arc::new(ZaiClient::with_config(credential, http)?),
        Provider::Copilot => Arc::new(CopilotClient::with_config(credential, http)?),
    };
    Ok(client)
}
