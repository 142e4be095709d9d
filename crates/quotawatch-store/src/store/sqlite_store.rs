//! SqliteStore - connection pool and schema

use super::cycles::ProviderStore;
use super::helpers::db_err;
use quotawatch_core::{Error, Provider, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, info};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        provider TEXT NOT NULL,
        captured_at TEXT NOT NULL,
        plan TEXT,
        raw_json TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS snapshot_quotas (
        snapshot_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        quota_limit REAL NOT NULL,
        used REAL NOT NULL,
        resets_at TEXT,
        unlimited INTEGER NOT NULL DEFAULT 0,
        percent_remaining REAL,
        PRIMARY KEY (snapshot_id, name),
        FOREIGN KEY (snapshot_id) REFERENCES snapshots(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reset_cycles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        provider TEXT NOT NULL,
        quota_name TEXT NOT NULL,
        cycle_start TEXT NOT NULL,
        cycle_end TEXT,
        reset_date TEXT,
        peak_used REAL NOT NULL DEFAULT 0,
        total_delta REAL NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        provider TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'agent',
        started_at TEXT NOT NULL,
        ended_at TEXT,
        poll_interval_secs INTEGER NOT NULL,
        snapshot_count INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS session_peaks (
        session_id TEXT NOT NULL,
        quota_name TEXT NOT NULL,
        start_used REAL NOT NULL,
        max_used REAL NOT NULL,
        PRIMARY KEY (session_id, quota_name),
        FOREIGN KEY (session_id) REFERENCES sessions(id)
    )
    "#,
    // At most one open cycle per quota
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_reset_cycles_open
    ON reset_cycles(provider, quota_name) WHERE cycle_end IS NULL
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_reset_cycles_history
    ON reset_cycles(provider, quota_name, cycle_start)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_snapshots_provider_time
    ON snapshots(provider, captured_at DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_sessions_provider
    ON sessions(provider, started_at DESC)
    "#,
];

/// SQLite store for snapshots, reset cycles and sessions
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with the given connection pool
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `db_path` and run migrations
    pub async fn from_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Database(format!("failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;

        info!("SQLite store initialized at {}", db_path.display());
        Ok(store)
    }

    /// Create a new in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.run_migrations().await?;

        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        for statement in MIGRATIONS.iter().copied() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }

        debug!("Database migrations completed");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A `CycleStore` view limited to one provider
    #[must_use]
    pub fn scoped(&self, provider: Provider) -> ProviderStore {
        ProviderStore::new(self.clone(), provider)
    }
}
