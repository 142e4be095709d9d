//! Error types for quotawatch-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A cycle is already open for this quota
    #[error("cycle already open for quota: {0}")]
    CycleAlreadyOpen(String),

    /// No open cycle exists for this quota
    #[error("no active cycle for quota: {0}")]
    NoActiveCycle(String),

    /// A storage operation failed while updating one quota
    #[error("quota {quota}: {source}")]
    Quota {
        /// Quota name the failure belongs to
        quota: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// One or more quotas in a snapshot failed to update
    #[error("tracker failed for {} quota(s): {}", .failures.len(), format_failures(.failures))]
    Process {
        /// Per-quota failures; quotas not listed were updated
        failures: Vec<QuotaFailure>,
    },
}

/// A single quota's failure inside a `Process` call
#[derive(Debug)]
pub struct QuotaFailure {
    /// Quota name
    pub quota: String,
    /// What went wrong
    pub error: Error,
}

impl Error {
    /// Tag an error with the quota it belongs to
    #[must_use]
    pub fn for_quota(self, quota: &str) -> Self {
        Self::Quota {
            quota: quota.to_string(),
            source: Box::new(self),
        }
    }

    /// Names of the quotas that failed, for `Process` errors
    #[must_use]
    pub fn failed_quotas(&self) -> Vec<&str> {
        match self {
            Self::Process { failures } => failures.iter().map(|f| f.quota.as_str()).collect(),
            Self::Quota { quota, .. } => vec![quota.as_str()],
            _ => Vec::new(),
        }
    }
}

fn format_failures(failures: &[QuotaFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.quota, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
