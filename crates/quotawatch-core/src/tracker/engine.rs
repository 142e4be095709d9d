//! Per-quota state machine

use crate::error::{Error, QuotaFailure, Result};
use crate::snapshot::{QuotaReading, Snapshot};
use crate::store::CycleStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Callback invoked with the quota name after a reset has been recorded
pub type ResetHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Last successful observation of one quota
#[derive(Debug, Clone, Copy)]
struct LastValue {
    used: f64,
    /// `limit - used`, unclamped so overage keeps counting
    headroom: f64,
}

#[derive(Default)]
struct TrackerState {
    /// Values from the last successful update, per quota
    last_values: HashMap<String, LastValue>,
    /// Reset marker from the last successful update, per quota
    last_resets: HashMap<String, Option<DateTime<Utc>>>,
    /// Set once the first snapshot has been processed by this instance
    primed: bool,
    on_reset: Option<ResetHook>,
}

/// What happened to one quota during `process`
enum Outcome {
    Opened,
    Reset,
    Updated,
}

/// Reset-cycle tracker for one provider
pub struct Tracker {
    store: Arc<dyn CycleStore>,
    state: Mutex<TrackerState>,
}

impl Tracker {
    /// Create a tracker writing through the given store
    #[must_use]
    pub fn new(store: Arc<dyn CycleStore>) -> Self {
        Self {
            store,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Underlying cycle store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CycleStore> {
        &self.store
    }

    /// Register the reset hook, replacing any previous one.
    ///
    /// The hook runs synchronously inside `process`, after the old cycle is
    /// closed and the new one is open.
    pub async fn set_on_reset<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.state.lock().await.on_reset = Some(Arc::new(hook));
    }

    /// Process one snapshot.
    ///
    /// Every reading is handled independently. If any quota fails, the
    /// others are still written and an `Error::Process` listing the failed
    /// quotas is returned. Calls are serialized internally.
    #[instrument(skip(self, snapshot), fields(provider = %snapshot.provider, quotas = snapshot.readings.len()))]
    pub async fn process(&self, snapshot: &Snapshot) -> Result<()> {
        let mut state = self.state.lock().await;
        let first_batch = !state.primed;
        let mut failures = Vec::new();

        for reading in &snapshot.readings {
            match self
                .process_quota(&mut state, reading, snapshot.captured_at, first_batch)
                .await
            {
                Ok(Outcome::Reset) => {
                    if let Some(hook) = state.on_reset.clone() {
                        hook(reading.name.as_str());
                    }
                }
                Ok(Outcome::Opened | Outcome::Updated) => {}
                Err(e) => {
                    warn!(quota = %reading.name, error = %e, "Quota update failed");
                    failures.push(QuotaFailure {
                        quota: reading.name.clone(),
                        error: e.for_quota(&reading.name),
                    });
                }
            }
        }

        state.primed = true;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Process { failures })
        }
    }

    async fn process_quota(
        &self,
        state: &mut TrackerState,
        reading: &QuotaReading,
        captured_at: DateTime<Utc>,
        first_batch: bool,
    ) -> Result<Outcome> {
        let name = reading.name.as_str();
        let used = reading.used;
        let headroom = reading.limit - reading.used;

        let outcome = match self.store.query_active_cycle(name).await? {
            None => {
                self.store
                    .create_cycle(name, captured_at, reading.resets_at)
                    .await?;
                self.store.update_cycle(name, used, 0.0).await?;
                info!(quota = %name, used, "Started tracking quota");
                Outcome::Opened
            }
            Some(cycle) => {
                let last = if first_batch {
                    None
                } else {
                    state.last_values.get(name).copied()
                };

                // Without an in-memory marker (e.g. after a restart) the open
                // cycle's reset date stands in for the previous one.
                let previous_marker = match state.last_resets.get(name) {
                    Some(marker) => *marker,
                    None => cycle.reset_date,
                };
                let marker_changed = matches!(
                    (previous_marker, reading.resets_at),
                    (Some(prev), Some(current)) if prev != current
                );
                let overdue_refill = match (cycle.reset_date, last) {
                    (Some(reset_date), Some(prev)) => {
                        captured_at > reset_date && headroom > prev.headroom
                    }
                    _ => false,
                };

                if marker_changed || overdue_refill {
                    let end = cycle
                        .reset_date
                        .filter(|reset_date| *reset_date < captured_at)
                        .unwrap_or(captured_at);
                    self.store
                        .close_cycle(name, end, cycle.peak_used, cycle.total_delta)
                        .await?;
                    self.store
                        .create_cycle(name, captured_at, reading.resets_at)
                        .await?;
                    self.store.update_cycle(name, used, 0.0).await?;
                    info!(
                        quota = %name,
                        peak = cycle.peak_used,
                        consumed = cycle.total_delta,
                        via_marker = marker_changed,
                        "Quota reset detected, cycle closed"
                    );
                    Outcome::Reset
                } else {
                    let mut total_delta = cycle.total_delta;
                    if let Some(prev) = last {
                        let delta = used - prev.used;
                        if delta > 0.0 {
                            total_delta += delta;
                        }
                    }
                    let peak_used = cycle.peak_used.max(used);
                    self.store.update_cycle(name, peak_used, total_delta).await?;
                    debug!(quota = %name, peak_used, total_delta, "Cycle updated");
                    Outcome::Updated
                }
            }
        };

        state
            .last_values
            .insert(name.to_string(), LastValue { used, headroom });
        state.last_resets.insert(name.to_string(), reading.resets_at);
        Ok(outcome)
    }
}
