//! Trait for cycle storage backends

use crate::cycle::Cycle;
use crate::error::Result;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};

/// Trait for cycle storage backends
///
/// One implementation instance serves exactly one provider; quota names
/// are only unique within a provider.
#[async_trait::async_trait]
pub trait CycleStore: Send + Sync {
    /// The single open cycle for this quota, if any
    async fn query_active_cycle(&self, quota: &str) -> Result<Option<Cycle>>;

    /// Open a new cycle; fails with `CycleAlreadyOpen` if one is open
    async fn create_cycle(
        &self,
        quota: &str,
        start: DateTime<Utc>,
        reset_date: Option<DateTime<Utc>>,
    ) -> Result<Cycle>;

    /// Overwrite the open cycle's running statistics
    async fn update_cycle(&self, quota: &str, peak_used: f64, total_delta: f64) -> Result<()>;

    /// Close the open cycle with its final statistics
    async fn close_cycle(
        &self,
        quota: &str,
        end: DateTime<Utc>,
        peak_used: f64,
        total_delta: f64,
    ) -> Result<()>;

    /// Closed cycles for this quota, oldest first
    async fn query_cycle_history(&self, quota: &str) -> Result<Vec<Cycle>>;

    /// Most recently inserted snapshot
    async fn query_latest_snapshot(&self) -> Result<Option<Snapshot>>;

    /// Get the store name (for logging)
    fn name(&self) -> &str;
}
