//! Session records

use chrono::{DateTime, Utc};
use quotawatch_core::Provider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What a session row measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// One agent run, from start to shutdown
    #[default]
    Agent,
    /// A burst of consumption, closed after an idle timeout
    Usage,
}

impl SessionKind {
    /// Stored name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Usage => "usage",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(Self::Agent),
            "usage" => Ok(Self::Usage),
            other => Err(format!("unknown session kind: {other}")),
        }
    }
}

/// One agent run or one usage burst for a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: Uuid,
    /// Provider the agent polled
    pub provider: Provider,
    /// Agent run or usage burst
    #[serde(default)]
    pub kind: SessionKind,
    /// When the agent started
    pub started_at: DateTime<Utc>,
    /// When the agent stopped; `None` while running (or if it crashed)
    pub ended_at: Option<DateTime<Utc>>,
    /// Poll interval in seconds
    pub poll_interval_secs: i64,
    /// Snapshots stored during the session
    pub snapshot_count: i64,
}

impl Session {
    /// Create a new open agent session
    #[must_use]
    pub fn start(provider: Provider, started_at: DateTime<Utc>, poll_interval_secs: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            kind: SessionKind::Agent,
            started_at,
            ended_at: None,
            poll_interval_secs,
            snapshot_count: 0,
        }
    }

    /// Create a new open usage session
    #[must_use]
    pub fn usage(provider: Provider, started_at: DateTime<Utc>, poll_interval_secs: i64) -> Self {
        Self {
            kind: SessionKind::Usage,
            ..Self::start(provider, started_at, poll_interval_secs)
        }
    }

    /// Whether the session is still open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Usage range of one quota during a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPeak {
    /// Quota name
    pub quota_name: String,
    /// Used value at the first snapshot of the session
    pub start_used: f64,
    /// Highest used value seen during the session
    pub max_used: f64,
}

impl SessionPeak {
    /// Consumption attributable to the session
    #[must_use]
    pub fn consumed(&self) -> f64 {
        (self.max_used - self.start_used).max(0.0)
    }
}
