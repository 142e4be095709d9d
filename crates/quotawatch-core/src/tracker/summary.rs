//! Usage summary - read-only rollup over a quota's cycles

use super::engine::Tracker;
use super::MIN_RATE_WINDOW_MINUTES;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Point-in-time statistics for one quota
///
/// A quota that has never been seen yields a zeroed summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Quota name
    pub quota_name: String,
    /// Entitlement from the latest snapshot
    pub limit: f64,
    /// Used value from the latest snapshot
    pub current_used: f64,
    /// Remaining value from the latest snapshot
    pub current_remaining: f64,
    /// Percent used; `None` for unlimited or unknown quotas
    pub usage_percent: Option<f64>,
    /// Whether the quota is unlimited
    pub unlimited: bool,
    /// Expected reset of the active cycle
    pub reset_date: Option<DateTime<Utc>>,
    /// Seconds until `reset_date`; negative once overdue
    pub seconds_until_reset: Option<i64>,
    /// Consumption per hour in the active cycle
    pub current_rate: Option<f64>,
    /// Projected used value at reset, capped at `limit`
    pub projected_usage: Option<f64>,
    /// Number of closed cycles
    pub completed_cycles: usize,
    /// Mean consumption across closed cycles
    pub avg_per_cycle: f64,
    /// Highest peak across closed cycles and the active one
    pub peak_cycle: f64,
    /// Consumption across all cycles including the active one
    pub total_tracked: f64,
    /// Start of the oldest closed cycle
    pub tracking_since: Option<DateTime<Utc>>,
}

impl UsageSummary {
    /// Time left until reset, if known
    #[must_use]
    pub fn time_until_reset(&self) -> Option<Duration> {
        self.seconds_until_reset.map(Duration::seconds)
    }
}

impl Tracker {
    /// Summarize a quota as of now
    pub async fn usage_summary(&self, quota: &str) -> Result<UsageSummary> {
        self.usage_summary_at(quota, Utc::now()).await
    }

    /// Summarize a quota as of `now`
    #[instrument(skip(self))]
    pub async fn usage_summary_at(&self, quota: &str, now: DateTime<Utc>) -> Result<UsageSummary> {
        let store = self.store();
        let active = store.query_active_cycle(quota).await?;
        let history = store.query_cycle_history(quota).await?;
        let latest = store.query_latest_snapshot().await?;

        let mut summary = UsageSummary {
            quota_name: quota.to_string(),
            completed_cycles: history.len(),
            tracking_since: history.first().map(|c| c.cycle_start),
            ..UsageSummary::default()
        };

        let closed_total: f64 = history.iter().map(|c| c.total_delta).sum();
        if !history.is_empty() {
            summary.avg_per_cycle = closed_total / history.len() as f64;
        }
        summary.peak_cycle = history.iter().map(|c| c.peak_used).fold(0.0, f64::max);
        summary.total_tracked = closed_total;

        let reading = latest.as_ref().and_then(|s| s.reading(quota));
        if let Some(reading) = reading {
            summary.limit = reading.limit;
            summary.current_used = reading.used;
            summary.current_remaining = reading.remaining();
            summary.usage_percent = reading.usage_percent();
            summary.unlimited = reading.unlimited;
        }

        if let Some(cycle) = &active {
            summary.peak_cycle = summary.peak_cycle.max(cycle.peak_used);
            summary.total_tracked += cycle.total_delta;
            summary.reset_date = cycle.reset_date;

            let elapsed = now - cycle.cycle_start;
            if elapsed >= Duration::minutes(MIN_RATE_WINDOW_MINUTES) && cycle.total_delta > 0.0 {
                summary.current_rate = Some(cycle.total_delta / hours(elapsed));
            }
        }

        if summary.reset_date.is_none() {
            summary.reset_date = reading.and_then(|r| r.resets_at);
        }

        if let Some(reset_date) = summary.reset_date {
            let until = reset_date - now;
            summary.seconds_until_reset = Some(until.num_seconds());

            if let Some(rate) = summary.current_rate {
                let hours_left = hours(until);
                if !summary.unlimited && hours_left > 0.0 && summary.limit > 0.0 {
                    let projected = summary.current_used + rate * hours_left;
                    summary.projected_usage = Some(projected.min(summary.limit));
                }
            }
        }

        Ok(summary)
    }
}

fn hours(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 3_600_000.0
}
