//! Configuration validation
//!
//! Rejects configurations the agents cannot run with and warns about
//! questionable ones.

use super::config::{credential_env_var, AppConfig};
use anyhow::{bail, Result};
use quotawatch_core::Provider;
use std::ops::RangeInclusive;
use tracing::{info, warn};

/// Allowed poll interval in seconds
pub const INTERVAL_RANGE: RangeInclusive<u64> = 10..=3600;

/// Validate the configuration and return the providers to poll
pub fn validate_config(config: &AppConfig) -> Result<Vec<Provider>> {
    validate_config_with(config, |var| std::env::var(var).ok())
}

/// Like [`validate_config`], with an explicit environment lookup
pub fn validate_config_with(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Vec<Provider>> {
    let interval = config.polling.interval_secs;
    if !INTERVAL_RANGE.contains(&interval) {
        bail!(
            "polling.interval_secs must be between {} and {} (got {})",
            INTERVAL_RANGE.start(),
            INTERVAL_RANGE.end(),
            interval
        );
    }

    if let Some(threshold) = config.polling.alert_threshold {
        if !(0.0..=100.0).contains(&threshold) {
            bail!("polling.alert_threshold must be a percentage (got {threshold})");
        }
    }

    let idle = config.polling.session_idle_secs;
    if idle != 0 && idle < interval {
        bail!(
            "polling.session_idle_secs must be 0 or at least polling.interval_secs ({interval}), got {idle}"
        );
    }

    if config.server.port < 1024 {
        warn!(
            port = config.server.port,
            "Port below 1024 usually requires elevated privileges"
        );
    }

    let mut enabled = Vec::new();
    for provider in Provider::ALL {
        if !config.providers.get(provider).enabled {
            continue;
        }
        if config.providers.credential_with(provider, &lookup).is_some() {
            enabled.push(provider);
        } else {
            info!(
                provider = %provider,
                "No credential configured (set {}), skipping",
                credential_env_var(provider)
            );
        }
    }

    if enabled.is_empty() {
        bail!(
            "No provider is enabled with a credential; set one of SYNTHETIC_API_KEY, ZAI_API_KEY or COPILOT_TOKEN"
        );
    }

    Ok(enabled)
}
