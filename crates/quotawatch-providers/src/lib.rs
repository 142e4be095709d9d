//! QuotaWatch Providers - Quota API clients and polling agents
//!
//! This crate provides:
//! - Clients for Synthetic, Z.ai and GitHub Copilot quota endpoints
//! - Normalization of each provider's response into a `Snapshot`
//! - The polling `Agent` that drives a tracker for one provider
//! - Usage sessions bounded by an idle timeout

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod client;
pub mod error;
pub mod providers;

#[cfg(test)]
mod test_support;

pub use agent::{Agent, PollingSwitch, UsageSessions};
pub use client::{redact_secret, HttpConfig, QuotaClient};
pub use error::{ProviderError, Result};
pub use providers::{CopilotClient, SyntheticClient, ZaiClient};
