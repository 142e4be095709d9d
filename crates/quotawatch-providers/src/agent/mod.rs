//! Agent - polling loop for one provider
//!
//! An agent owns one session per run: it polls once immediately, then on
//! every tick, feeding each snapshot to the provider's tracker. Fetches
//! are abandoned on shutdown; tracker writes are not. A polling check can
//! pause fetching without stopping the agent.

use crate::client::QuotaClient;
use chrono::Utc;
use quotawatch_core::{Provider, Snapshot, Tracker};
use quotawatch_store::{Session, SqliteStore};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod usage;

pub use usage::UsageSessions;

#[cfg(test)]
mod tests;

type PollingCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Shared on/off flag for an agent's polling
#[derive(Debug, Clone)]
pub struct PollingSwitch(Arc<AtomicBool>);

impl PollingSwitch {
    /// Create a switch in the given state
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    /// Whether polling is on
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Turn polling on or off
    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

impl Default for PollingSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Polling agent for one provider
pub struct Agent {
    client: Arc<dyn QuotaClient>,
    store: SqliteStore,
    tracker: Arc<Tracker>,
    interval: Duration,
    alert_threshold: Option<f64>,
    /// Quotas currently above the alert threshold
    alerted: Mutex<HashSet<String>>,
    /// Skip the fetch while this returns false
    polling_check: Option<PollingCheck>,
    usage_sessions: Option<UsageSessions>,
}

impl Agent {
    /// Create an agent
    #[must_use]
    pub fn new(
        client: Arc<dyn QuotaClient>,
        store: SqliteStore,
        tracker: Arc<Tracker>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            store,
            tracker,
            interval,
            alert_threshold: None,
            alerted: Mutex::new(HashSet::new()),
            polling_check: None,
            usage_sessions: None,
        }
    }

    /// Warn once when a quota's usage percent reaches `percent`
    #[must_use]
    pub fn with_alert_threshold(mut self, percent: f64) -> Self {
        self.alert_threshold = Some(percent);
        self
    }

    /// Consult `check` before every fetch; polls are skipped while it returns false
    #[must_use]
    pub fn with_polling_check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.polling_check = Some(Arc::new(check));
        self
    }

    /// Track usage sessions that close after `idle_timeout` without an increase
    #[must_use]
    pub fn with_usage_sessions(mut self, idle_timeout: Duration) -> Self {
        self.usage_sessions = Some(UsageSessions::new(
            self.store.clone(),
            self.provider(),
            idle_timeout,
            self.interval,
        ));
        self
    }

    /// Provider this agent polls
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.client.provider()
    }

    /// Poll until `cancel` fires.
    ///
    /// Errors only if the session cannot be recorded at startup.
    pub async fn run(&self, cancel: CancellationToken) -> quotawatch_core::Result<()> {
        let provider = self.provider();
        let started_at = Utc::now();

        self.store
            .close_orphaned_sessions(provider, started_at)
            .await?;
        let session = Session::start(
            provider,
            started_at,
            i64::try_from(self.interval.as_secs()).unwrap_or(i64::MAX),
        );
        self.store.create_session(&session).await?;

        self.tracker
            .set_on_reset(move |quota| {
                info!(provider = %provider, quota = %quota, "Quota reset detected");
            })
            .await;

        info!(
            provider = %provider,
            session_id = %session.id,
            interval_secs = self.interval.as_secs(),
            "Agent started"
        );

        self.poll(session.id, &cancel).await;

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll(session.id, &cancel).await;
                }
            }
        }

        if let Some(usage) = &self.usage_sessions {
            if let Err(e) = usage.close().await {
                warn!(provider = %provider, error = %e, "Failed to close usage session");
            }
        }
        if let Err(e) = self.store.close_session(session.id, Utc::now()).await {
            warn!(provider = %provider, error = %e, "Failed to close session");
        }
        info!(provider = %provider, session_id = %session.id, "Agent stopped");
        Ok(())
    }

    /// Run one poll cycle: fetch, store, track.
    ///
    /// Returns the snapshot if the fetch succeeded. Nothing is fetched
    /// while the polling check says no.
    pub async fn poll(&self, session_id: Uuid, cancel: &CancellationToken) -> Option<Snapshot> {
        let provider = self.provider();

        if let Some(check) = &self.polling_check {
            if !check() {
                debug!(provider = %provider, "Polling paused, skipping fetch");
                return None;
            }
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(provider = %provider, "Fetch abandoned for shutdown");
                return None;
            }
            result = self.client.fetch_snapshot(Utc::now()) => result,
        };

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Failed to fetch quotas");
                return None;
            }
        };

        match self.store.insert_snapshot(&snapshot).await {
            Ok(_) => {
                if let Err(e) = self.store.increment_snapshot_count(session_id).await {
                    warn!(provider = %provider, error = %e, "Failed to count snapshot");
                }
            }
            Err(e) => error!(provider = %provider, error = %e, "Failed to store snapshot"),
        }

        if let Err(e) = self.tracker.process(&snapshot).await {
            error!(
                provider = %provider,
                failed = ?e.failed_quotas(),
                error = %e,
                "Tracker processing failed"
            );
        }

        if let Err(e) = self.store.update_session_peaks(session_id, &snapshot).await {
            warn!(provider = %provider, error = %e, "Failed to update session peaks");
        }

        if let Some(usage) = &self.usage_sessions {
            if let Err(e) = usage.report_poll(&snapshot).await {
                warn!(provider = %provider, error = %e, "Failed to update usage session");
            }
        }

        self.check_thresholds(&snapshot).await;

        for reading in snapshot.readings.iter().filter(|r| !r.unlimited) {
            info!(
                provider = %provider,
                quota = %reading.name,
                limit = reading.limit,
                used = reading.used,
                remaining = reading.remaining(),
                plan = snapshot.plan.as_deref().unwrap_or(""),
                "Poll complete"
            );
        }

        Some(snapshot)
    }

    async fn check_thresholds(&self, snapshot: &Snapshot) {
        let Some(threshold) = self.alert_threshold else {
            return;
        };
        let mut alerted = self.alerted.lock().await;

        for reading in &snapshot.readings {
            let Some(pct) = reading.usage_percent() else {
                continue;
            };
            if pct >= threshold {
                if alerted.insert(reading.name.clone()) {
                    warn!(
                        provider = %snapshot.provider,
                        quota = %reading.name,
                        usage_percent = pct,
                        threshold,
                        "Quota usage above threshold"
                    );
                }
            } else {
                alerted.remove(&reading.name);
            }
        }
    }
}
