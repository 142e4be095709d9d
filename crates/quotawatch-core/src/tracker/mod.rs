//! Tracker - Reset-cycle detection and usage accounting
//!
//! A [`Tracker`] consumes the snapshots of one provider in arrival order,
//! keeps exactly one open cycle per quota name, and closes it when the
//! provider resets that quota.
//!
//! Reset detection uses two signals:
//! - the quota's reset marker (`resets_at`) changed from a known value
//! - fallback: the cycle's reset date has passed and remaining went up
//!
//! The fallback can misfire if a provider raises an entitlement mid-cycle;
//! it is kept because some providers never move their marker.

mod engine;
mod summary;


pub use engine::{ResetHook, Tracker};
pub use summary::UsageSummary;

/// Minimum active-cycle age before a consumption rate is reported
pub const MIN_RATE_WINDOW_MINUTES: i64 = 30;
