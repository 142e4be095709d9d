//! Store - Quota persistence using SQLite
//!
//! It uses sqlx for async SQLite access (embedded, no server required).
//! Timestamps are stored as fixed-width RFC 3339 strings so that string
//! comparison matches time order.

mod cycles;
mod helpers;
mod sessions;
mod snapshots;
mod sqlite_store;


pub use cycles::ProviderStore;
pub use helpers::{default_data_dir, default_db_path};
pub use sqlite_store::SqliteStore;
