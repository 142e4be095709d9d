//! Helper functions for row conversion and timestamps

use crate::session::{Session, SessionPeak};
use chrono::{DateTime, SecondsFormat, Utc};
use quotawatch_core::{Cycle, Error, Provider, QuotaReading, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Format a timestamp for storage
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("invalid timestamp: {e}")))
}

pub(crate) fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

pub(crate) fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

pub(crate) fn parse_provider(s: &str) -> Result<Provider> {
    s.parse().map_err(Error::Serialization)
}

/// Convert a SQLite row to a Cycle
pub(crate) fn row_to_cycle(row: SqliteRow) -> Result<Cycle> {
    let cycle_start: String = row.get("cycle_start");

    Ok(Cycle {
        id: row.get("id"),
        quota_name: row.get("quota_name"),
        cycle_start: parse_ts(&cycle_start)?,
        cycle_end: parse_opt_ts(row.get("cycle_end"))?,
        reset_date: parse_opt_ts(row.get("reset_date"))?,
        peak_used: row.get("peak_used"),
        total_delta: row.get("total_delta"),
    })
}

/// Convert a SQLite row to a QuotaReading
pub(crate) fn row_to_reading(row: SqliteRow) -> Result<QuotaReading> {
    let unlimited: i64 = row.get("unlimited");

    Ok(QuotaReading {
        name: row.get("name"),
        limit: row.get("quota_limit"),
        used: row.get("used"),
        resets_at: parse_opt_ts(row.get("resets_at"))?,
        unlimited: unlimited != 0,
        percent_remaining: row.get("percent_remaining"),
    })
}

/// Convert a SQLite row to a Session
pub(crate) fn row_to_session(row: SqliteRow) -> Result<Session> {
    let id_str: String = row.get("id");
    let provider_str: String = row.get("provider");
    let kind_str: String = row.get("kind");
    let started_at: String = row.get("started_at");

    let id =
        Uuid::parse_str(&id_str).map_err(|e| Error::Serialization(format!("invalid uuid: {e}")))?;

    Ok(Session {
        id,
        provider: parse_provider(&provider_str)?,
        kind: kind_str.parse().map_err(Error::Serialization)?,
        started_at: parse_ts(&started_at)?,
        ended_at: parse_opt_ts(row.get("ended_at"))?,
        poll_interval_secs: row.get("poll_interval_secs"),
        snapshot_count: row.get("snapshot_count"),
    })
}

/// Convert a SQLite row to a SessionPeak
pub(crate) fn row_to_peak(row: SqliteRow) -> SessionPeak {
    SessionPeak {
        quota_name: row.get("quota_name"),
        start_used: row.get("start_used"),
        max_used: row.get("max_used"),
    }
}

/// Get the default data directory for QuotaWatch
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".quotawatch"))
        .unwrap_or_else(|| std::path::PathBuf::from(".quotawatch"))
}

/// Get the default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join("quotawatch.db")
}
