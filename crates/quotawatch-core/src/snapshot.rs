//! Snapshot - normalized point-in-time quota readings
//!
//! Every provider adapter converts its response into a [`Snapshot`]; the
//! tracker only ever sees this shape.

use crate::provider::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One named quota's state at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaReading {
    /// Identifier unique within a provider (e.g. "subscription")
    pub name: String,
    /// Capacity for the current cycle (entitlement)
    pub limit: f64,
    /// Consumption so far in the current cycle
    pub used: f64,
    /// When the current cycle is expected to end, if the provider says
    pub resets_at: Option<DateTime<Utc>>,
    /// Suppresses percentage and projection math
    #[serde(default)]
    pub unlimited: bool,
    /// Provider-reported percent remaining (0-100), if it reports one
    #[serde(default)]
    pub percent_remaining: Option<f64>,
}

impl QuotaReading {
    /// Create a reading from a limit and a used count
    #[must_use]
    pub fn new(name: impl Into<String>, limit: f64, used: f64) -> Self {
        Self {
            name: name.into(),
            limit,
            used,
            resets_at: None,
            unlimited: false,
            percent_remaining: None,
        }
    }

    /// Create a reading from an entitlement and a remaining count
    #[must_use]
    pub fn from_remaining(name: impl Into<String>, entitlement: f64, remaining: f64) -> Self {
        Self::new(name, entitlement, entitlement - remaining)
    }

    /// Create an unlimited reading
    #[must_use]
    pub fn unlimited(name: impl Into<String>) -> Self {
        Self {
            unlimited: true,
            ..Self::new(name, 0.0, 0.0)
        }
    }

    /// Set the expected reset time
    #[must_use]
    pub fn with_reset(mut self, resets_at: DateTime<Utc>) -> Self {
        self.resets_at = Some(resets_at);
        self
    }

    /// Set the provider-reported percent remaining
    #[must_use]
    pub fn with_percent_remaining(mut self, pct: f64) -> Self {
        self.percent_remaining = Some(pct);
        self
    }

    /// Headroom left in the current cycle (`limit - used`, never negative)
    #[must_use]
    pub fn remaining(&self) -> f64 {
        if self.unlimited {
            return 0.0;
        }
        (self.limit - self.used).max(0.0)
    }

    /// Percent of the quota used (0.0 - 100.0), or `None` if unknown.
    ///
    /// Providers that report "percent remaining" are inverted so every
    /// provider reads the same way.
    #[must_use]
    pub fn usage_percent(&self) -> Option<f64> {
        if self.unlimited {
            return None;
        }
        if let Some(pct) = self.percent_remaining {
            return Some(100.0 - pct);
        }
        (self.limit > 0.0).then(|| self.used / self.limit * 100.0)
    }
}

/// A captured set of quota readings from one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Provider the readings came from
    pub provider: Provider,
    /// When the poll happened (UTC)
    pub captured_at: DateTime<Utc>,
    /// One reading per quota name
    pub readings: Vec<QuotaReading>,
    /// Plan or tier label, if the provider reports one
    #[serde(default)]
    pub plan: Option<String>,
    /// Raw provider payload, kept for auditing
    #[serde(default, skip_serializing)]
    pub raw_json: Option<String>,
}

impl Snapshot {
    /// Create a snapshot with no readings
    #[must_use]
    pub fn new(provider: Provider, captured_at: DateTime<Utc>) -> Self {
        Self {
            provider,
            captured_at,
            readings: Vec::new(),
            plan: None,
            raw_json: None,
        }
    }

    /// Add a reading
    #[must_use]
    pub fn with_reading(mut self, reading: QuotaReading) -> Self {
        self.readings.push(reading);
        self
    }

    /// Look a reading up by quota name
    #[must_use]
    pub fn reading(&self, name: &str) -> Option<&QuotaReading> {
        self.readings.iter().find(|r| r.name == name)
    }

    /// Quota names in this snapshot
    #[must_use]
    pub fn quota_names(&self) -> Vec<&str> {
        self.readings.iter().map(|r| r.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_and_usage_percent() {
        let reading = QuotaReading::new("subscription", 1000.0, 250.0);
        assert_eq!(reading.remaining(), 750.0);
        assert_eq!(reading.usage_percent(), Some(25.0));

        let over = QuotaReading::new("subscription", 100.0, 130.0);
        assert_eq!(over.remaining(), 0.0);
    }

    #[test]
    fn test_percent_remaining_is_inverted() {
        let reading = QuotaReading::from_remaining("premium_interactions", 1500.0, 1000.0)
            .with_percent_remaining(66.0);
        assert_eq!(reading.used, 500.0);
        assert_eq!(reading.usage_percent(), Some(34.0));
    }

    #[test]
    fn test_unlimited_reading() {
        let reading = QuotaReading::unlimited("chat");
        assert!(reading.unlimited);
        assert_eq!(reading.remaining(), 0.0);
        assert_eq!(reading.usage_percent(), None);
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = Snapshot::new(Provider::Synthetic, Utc::now())
            .with_reading(QuotaReading::new("subscription", 1000.0, 1.0))
            .with_reading(QuotaReading::new("search", 250.0, 2.0));
        assert_eq!(snapshot.quota_names(), vec!["subscription", "search"]);
        assert_eq!(snapshot.reading("search").map(|r| r.used), Some(2.0));
        assert!(snapshot.reading("toolcall").is_none());
    }
}
