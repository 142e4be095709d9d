//! In-memory cycle store

use super::traits::CycleStore;
use crate::cycle::Cycle;
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Inner {
    cycles: Vec<Cycle>,
    snapshots: Vec<Snapshot>,
    next_id: i64,
}

/// Cycle store held entirely in memory
///
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw snapshot
    pub async fn insert_snapshot(&self, snapshot: &Snapshot) {
        self.inner.write().await.snapshots.push(snapshot.clone());
    }

    /// Every cycle, open and closed, in creation order
    pub async fn all_cycles(&self) -> Vec<Cycle> {
        self.inner.read().await.cycles.clone()
    }
}

impl Inner {
    fn active_mut(&mut self, quota: &str) -> Option<&mut Cycle> {
        self.cycles
            .iter_mut()
            .find(|c| c.quota_name == quota && c.is_active())
    }
}

#[async_trait::async_trait]
impl CycleStore for MemoryStore {
    async fn query_active_cycle(&self, quota: &str) -> Result<Option<Cycle>> {
        let inner = self.inner.read().await;
        Ok(inner
            .cycles
            .iter()
            .find(|c| c.quota_name == quota && c.is_active())
            .cloned())
    }

    async fn create_cycle(
        &self,
        quota: &str,
        start: DateTime<Utc>,
        reset_date: Option<DateTime<Utc>>,
    ) -> Result<Cycle> {
        let mut inner = self.inner.write().await;
        if inner.active_mut(quota).is_some() {
            return Err(Error::CycleAlreadyOpen(quota.to_string()));
        }
        inner.next_id += 1;
        let cycle = Cycle::open(inner.next_id, quota, start, reset_date);
        inner.cycles.push(cycle.clone());
        debug!(quota = %quota, id = cycle.id, "Opened cycle");
        Ok(cycle)
    }

    async fn update_cycle(&self, quota: &str, peak_used: f64, total_delta: f64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let cycle = inner
            .active_mut(quota)
            .ok_or_else(|| Error::NoActiveCycle(quota.to_string()))?;
        cycle.peak_used = peak_used;
        cycle.total_delta = total_delta;
        Ok(())
    }

    async fn close_cycle(
        &self,
        quota: &str,
        end: DateTime<Utc>,
        peak_used: f64,
        total_delta: f64,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let cycle = inner
            .active_mut(quota)
            .ok_or_else(|| Error::NoActiveCycle(quota.to_string()))?;
        cycle.cycle_end = Some(end);
        cycle.peak_used = peak_used;
        cycle.total_delta = total_delta;
        debug!(quota = %quota, id = cycle.id, "Closed cycle");
        Ok(())
    }

    async fn query_cycle_history(&self, quota: &str) -> Result<Vec<Cycle>> {
        let inner = self.inner.read().await;
        let mut history: Vec<Cycle> = inner
            .cycles
            .iter()
            .filter(|c| c.quota_name == quota && !c.is_active())
            .cloned()
            .collect();
        history.sort_by_key(|c| (c.cycle_start, c.id));
        Ok(history)
    }

    async fn query_latest_snapshot(&self) -> Result<Option<Snapshot>> {
        Ok(self.inner.read().await.snapshots.last().cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
