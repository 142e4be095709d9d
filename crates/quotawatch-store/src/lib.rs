//! QuotaWatch Store - SQLite persistence
//!
//! This crate provides the durable side of QuotaWatch:
//! - Snapshot log: every raw poll, with its normalized readings
//! - Reset cycles: the `CycleStore` backend used by trackers
//! - Sessions: agent runs and usage bursts with per-quota peaks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod session;
pub mod store;

pub use quotawatch_core::{Error, Result};
pub use session::{Session, SessionKind, SessionPeak};
pub use store::{default_data_dir, default_db_path, ProviderStore, SqliteStore};
