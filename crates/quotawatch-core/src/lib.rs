//! QuotaWatch Core - Reset-cycle tracking
//!
//! This crate turns a stream of provider quota snapshots into per-cycle
//! usage statistics:
//! - Snapshot: normalized quota readings captured at one instant
//! - Cycle: one billing/reset period of a named quota
//! - Tracker: reset detection and per-cycle accumulation
//! - Summary: aggregate statistics and end-of-cycle projections
//! - Store: the persistence contract the tracker writes through

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cycle;
pub mod error;
pub mod provider;
pub mod shutdown;
pub mod snapshot;
pub mod store;
pub mod tracker;

pub use cycle::Cycle;
pub use error::{Error, QuotaFailure, Result};
pub use provider::{display_name, Provider};
pub use shutdown::{wait_for_shutdown_signal, ShutdownController, ShutdownPhase, TaskGuard};
pub use snapshot::{QuotaReading, Snapshot};
pub use store::{CycleStore, MemoryStore};
pub use tracker::{ResetHook, Tracker, UsageSummary};
