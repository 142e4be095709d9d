//! Agent and usage session bookkeeping

use super::helpers::{db_err, fmt_ts, row_to_peak, row_to_session};
use super::sqlite_store::SqliteStore;
use crate::session::{Session, SessionPeak};
use chrono::{DateTime, Utc};
use quotawatch_core::{Provider, Result, Snapshot};
use tracing::{debug, info, instrument};
use uuid::Uuid;

impl SqliteStore {
    /// Record a new session
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn create_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, provider, kind, started_at, ended_at, poll_interval_secs, snapshot_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.provider.as_str())
        .bind(session.kind.as_str())
        .bind(fmt_ts(session.started_at))
        .bind(session.ended_at.map(fmt_ts))
        .bind(session.poll_interval_secs)
        .bind(session.snapshot_count)
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        debug!(kind = %session.kind, "Created session {}", session.id);
        Ok(())
    }

    /// Mark a session as ended
    #[instrument(skip(self))]
    pub async fn close_session(&self, id: Uuid, ended_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE sessions SET ended_at = ?2 WHERE id = ?1 AND ended_at IS NULL")
            .bind(id.to_string())
            .bind(fmt_ts(ended_at))
            .execute(self.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Close sessions left open by a previous run that did not shut down
    #[instrument(skip(self))]
    pub async fn close_orphaned_sessions(
        &self,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET ended_at = ?2 WHERE provider = ?1 AND ended_at IS NULL",
        )
        .bind(provider.as_str())
        .bind(fmt_ts(now))
        .execute(self.pool())
        .await
        .map_err(db_err)?;

        let closed = result.rows_affected();
        if closed > 0 {
            info!(provider = %provider, closed, "Closed orphaned sessions");
        }
        Ok(closed)
    }

    /// Bump a session's stored-snapshot counter
    pub async fn increment_snapshot_count(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE sessions SET snapshot_count = snapshot_count + 1 WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Fold a snapshot's used values into the session's per-quota peaks
    #[instrument(skip(self, snapshot))]
    pub async fn update_session_peaks(&self, id: Uuid, snapshot: &Snapshot) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        for reading in snapshot.readings.iter().filter(|r| !r.unlimited) {
            sqlx::query(
                r#"
                INSERT INTO session_peaks (session_id, quota_name, start_used, max_used)
                VALUES (?1, ?2, ?3, ?3)
                ON CONFLICT(session_id, quota_name)
                DO UPDATE SET max_used = MAX(max_used, excluded.max_used)
                "#,
            )
            .bind(id.to_string())
            .bind(&reading.name)
            .bind(reading.used)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    /// Get a session by ID
    pub async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT id, provider, kind, started_at, ended_at, poll_interval_secs, snapshot_count
            FROM sessions
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(db_err)?;

        row.map(row_to_session).transpose()
    }

    /// Most recent sessions across all providers, newest first
    #[instrument(skip(self))]
    pub async fn list_sessions(&self, limit: i64) -> Result<Vec<Session>> {
        let rows = sqlx::query(
            r#"
            SELECT id, provider, kind, started_at, ended_at, poll_interval_secs, snapshot_count
            FROM sessions
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        rows.into_iter().map(row_to_session).collect()
    }

    /// Per-quota usage range for a session
    pub async fn session_peaks(&self, id: Uuid) -> Result<Vec<SessionPeak>> {
        let rows = sqlx::query(
            r#"
            SELECT quota_name, start_used, max_used
            FROM session_peaks
            WHERE session_id = ?1
            ORDER BY quota_name ASC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(row_to_peak).collect())
    }
}
