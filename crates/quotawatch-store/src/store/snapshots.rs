//! Raw snapshot log

use super::helpers::{db_err, fmt_ts, parse_provider, parse_ts, row_to_reading};
use super::sqlite_store::SqliteStore;
use chrono::{DateTime, Utc};
use quotawatch_core::{Provider, Result, Snapshot};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, instrument};

impl SqliteStore {
    /// Append a snapshot and its readings; returns the snapshot row ID
    #[instrument(skip(self, snapshot), fields(provider = %snapshot.provider))]
    pub async fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<i64> {
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        let result = sqlx::query(
            r#"
            INSERT INTO snapshots (provider, captured_at, plan, raw_json)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(snapshot.provider.as_str())
        .bind(fmt_ts(snapshot.captured_at))
        .bind(&snapshot.plan)
        .bind(&snapshot.raw_json)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let snapshot_id = result.last_insert_rowid();

        for reading in &snapshot.readings {
            sqlx::query(
                r#"
                INSERT INTO snapshot_quotas (
                    snapshot_id, name, quota_limit, used, resets_at, unlimited, percent_remaining
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(snapshot_id)
            .bind(&reading.name)
            .bind(reading.limit)
            .bind(reading.used)
            .bind(reading.resets_at.map(fmt_ts))
            .bind(i64::from(reading.unlimited))
            .bind(reading.percent_remaining)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        debug!(snapshot_id, readings = snapshot.readings.len(), "Stored snapshot");
        Ok(snapshot_id)
    }

    /// Most recent snapshot for a provider
    #[instrument(skip(self))]
    pub async fn query_latest_snapshot(&self, provider: Provider) -> Result<Option<Snapshot>> {
        let row = sqlx::query(
            r#"
            SELECT id, provider, captured_at, plan, raw_json
            FROM snapshots
            WHERE provider = ?1
            ORDER BY captured_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(provider.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => Ok(Some(self.hydrate_snapshot(row).await?)),
            None => Ok(None),
        }
    }

    /// Snapshots captured in `[from, to]`, oldest first
    #[instrument(skip(self))]
    pub async fn query_snapshots_range(
        &self,
        provider: Provider,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Snapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT id, provider, captured_at, plan, raw_json
            FROM snapshots
            WHERE provider = ?1 AND captured_at >= ?2 AND captured_at <= ?3
            ORDER BY captured_at ASC, id ASC
            LIMIT ?4
            "#,
        )
        .bind(provider.as_str())
        .bind(fmt_ts(from))
        .bind(fmt_ts(to))
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in rows {
            snapshots.push(self.hydrate_snapshot(row).await?);
        }
        Ok(snapshots)
    }

    /// Drop snapshots captured before `cutoff`; returns how many were removed
    #[instrument(skip(self))]
    pub async fn delete_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff = fmt_ts(cutoff);
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            DELETE FROM snapshot_quotas
            WHERE snapshot_id IN (SELECT id FROM snapshots WHERE captured_at < ?1)
            "#,
        )
        .bind(&cutoff)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let result = sqlx::query("DELETE FROM snapshots WHERE captured_at < ?1")
            .bind(&cutoff)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        let deleted = result.rows_affected();
        debug!(deleted, "Pruned old snapshots");
        Ok(deleted)
    }

    async fn hydrate_snapshot(&self, row: SqliteRow) -> Result<Snapshot> {
        let id: i64 = row.get("id");
        let provider_str: String = row.get("provider");
        let captured_at: String = row.get("captured_at");

        let rows = sqlx::query(
            r#"
            SELECT name, quota_limit, used, resets_at, unlimited, percent_remaining
            FROM snapshot_quotas
            WHERE snapshot_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        Ok(Snapshot {
            provider: parse_provider(&provider_str)?,
            captured_at: parse_ts(&captured_at)?,
            readings: rows
                .into_iter()
                .map(row_to_reading)
                .collect::<Result<Vec<_>>>()?,
            plan: row.get("plan"),
            raw_json: row.get("raw_json"),
        })
    }
}
