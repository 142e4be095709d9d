//! Cycle - one reset period of a named quota

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A billing/reset period for one quota name.
///
/// Open cycles (`cycle_end == None`) are mutated on every snapshot; closed
/// cycles are immutable history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    /// Store-assigned identifier
    pub id: i64,
    /// Quota the cycle belongs to
    pub quota_name: String,
    /// First observation of the cycle
    pub cycle_start: DateTime<Utc>,
    /// When the cycle closed; `None` while active
    pub cycle_end: Option<DateTime<Utc>>,
    /// Expected reset time carried from the opening reading
    pub reset_date: Option<DateTime<Utc>>,
    /// Highest `used` value observed while active
    pub peak_used: f64,
    /// Sum of positive `used` increases between consecutive snapshots
    pub total_delta: f64,
}

impl Cycle {
    /// Create a new open cycle with zeroed statistics
    #[must_use]
    pub fn open(
        id: i64,
        quota_name: impl Into<String>,
        cycle_start: DateTime<Utc>,
        reset_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            quota_name: quota_name.into(),
            cycle_start,
            cycle_end: None,
            reset_date,
            peak_used: 0.0,
            total_delta: 0.0,
        }
    }

    /// Whether the cycle is still open
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cycle_end.is_none()
    }

    /// Length of the cycle; open cycles are measured up to `now`
    #[must_use]
    pub fn duration(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.cycle_end.unwrap_or(now) - self.cycle_start
    }
}
