//! Reset cycle persistence

use super::helpers::{db_err, fmt_ts, row_to_cycle};
use super::sqlite_store::SqliteStore;
use chrono::{DateTime, Utc};
use quotawatch_core::{Cycle, CycleStore, Error, Provider, Result, Snapshot};
use tracing::{debug, instrument};

const CYCLE_COLUMNS: &str =
    "id, quota_name, cycle_start, cycle_end, reset_date, peak_used, total_delta";

/// Cycle store for a single provider, backed by [`SqliteStore`]
#[derive(Clone)]
pub struct ProviderStore {
    store: SqliteStore,
    provider: Provider,
}

impl ProviderStore {
    /// Create a view over `store` restricted to `provider`
    #[must_use]
    pub fn new(store: SqliteStore, provider: Provider) -> Self {
        Self { store, provider }
    }

    /// Provider this view is scoped to
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Shared store
    #[must_use]
    pub fn inner(&self) -> &SqliteStore {
        &self.store
    }
}

impl SqliteStore {
    /// Open cycle for a provider quota
    #[instrument(skip(self))]
    pub async fn query_active_cycle(&self, provider: Provider, quota: &str) -> Result<Option<Cycle>> {
        let sql = format!(
            "SELECT {CYCLE_COLUMNS} FROM reset_cycles \
             WHERE provider = ?1 AND quota_name = ?2 AND cycle_end IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(provider.as_str())
            .bind(quota)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;

        row.map(row_to_cycle).transpose()
    }

    /// Open a new cycle; the partial unique index rejects a second open one
    #[instrument(skip(self))]
    pub async fn create_cycle(
        &self,
        provider: Provider,
        quota: &str,
        start: DateTime<Utc>,
        reset_date: Option<DateTime<Utc>>,
    ) -> Result<Cycle> {
        let result = sqlx::query(
            r#"
            INSERT INTO reset_cycles (provider, quota_name, cycle_start, reset_date, peak_used, total_delta)
            VALUES (?1, ?2, ?3, ?4, 0, 0)
            "#,
        )
        .bind(provider.as_str())
        .bind(quota)
        .bind(fmt_ts(start))
        .bind(reset_date.map(fmt_ts))
        .execute(self.pool())
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if duplicate {
                Error::CycleAlreadyOpen(quota.to_string())
            } else {
                db_err(e)
            }
        })?;

        let cycle = Cycle::open(result.last_insert_rowid(), quota, start, reset_date);
        debug!(provider = %provider, quota = %quota, id = cycle.id, "Opened cycle");
        Ok(cycle)
    }

    /// Overwrite the open cycle's statistics
    #[instrument(skip(self))]
    pub async fn update_cycle(
        &self,
        provider: Provider,
        quota: &str,
        peak_used: f64,
        total_delta: f64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE reset_cycles
            SET peak_used = ?3, total_delta = ?4
            WHERE provider = ?1 AND quota_name = ?2 AND cycle_end IS NULL
            "#,
        )
        .bind(provider.as_str())
        .bind(quota)
        .bind(peak_used)
        .bind(total_delta)
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoActiveCycle(quota.to_string()));
        }
        Ok(())
    }

    /// Close the open cycle with final statistics
    #[instrument(skip(self))]
    pub async fn close_cycle(
        &self,
        provider: Provider,
        quota: &str,
        end: DateTime<Utc>,
        peak_used: f64,
        total_delta: f64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE reset_cycles
            SET cycle_end = ?3, peak_used = ?4, total_delta = ?5
            WHERE provider = ?1 AND quota_name = ?2 AND cycle_end IS NULL
            "#,
        )
        .bind(provider.as_str())
        .bind(quota)
        .bind(fmt_ts(end))
        .bind(peak_used)
        .bind(total_delta)
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoActiveCycle(quota.to_string()));
        }
        debug!(provider = %provider, quota = %quota, "Closed cycle");
        Ok(())
    }

    /// Closed cycles for a provider quota, oldest first
    #[instrument(skip(self))]
    pub async fn query_cycle_history(&self, provider: Provider, quota: &str) -> Result<Vec<Cycle>> {
        let sql = format!(
            "SELECT {CYCLE_COLUMNS} FROM reset_cycles \
             WHERE provider = ?1 AND quota_name = ?2 AND cycle_end IS NOT NULL \
             ORDER BY cycle_start ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(provider.as_str())
            .bind(quota)
            .fetch_all(self.pool())
            .await
            .map_err(db_err)?;

        rows.into_iter().map(row_to_cycle).collect()
    }
}

#[async_trait::async_trait]
impl CycleStore for ProviderStore {
    async fn query_active_cycle(&self, quota: &str) -> Result<Option<Cycle>> {
        self.store.query_active_cycle(self.provider, quota).await
    }

    async fn create_cycle(
        &self,
        quota: &str,
        start: DateTime<Utc>,
        reset_date: Option<DateTime<Utc>>,
    ) -> Result<Cycle> {
        self.store
            .create_cycle(self.provider, quota, start, reset_date)
            .await
    }

    async fn update_cycle(&self, quota: &str, peak_used: f64, total_delta: f64) -> Result<()> {
        self.store
            .update_cycle(self.provider, quota, peak_used, total_delta)
            .await
    }

    async fn close_cycle(
        &self,
        quota: &str,
        end: DateTime<Utc>,
        peak_used: f64,
        total_delta: f64,
    ) -> Result<()> {
        self.store
            .close_cycle(self.provider, quota, end, peak_used, total_delta)
            .await
    }

    async fn query_cycle_history(&self, quota: &str) -> Result<Vec<Cycle>> {
        self.store.query_cycle_history(self.provider, quota).await
    }

    async fn query_latest_snapshot(&self) -> Result<Option<Snapshot>> {
        self.store.query_latest_snapshot(self.provider).await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
