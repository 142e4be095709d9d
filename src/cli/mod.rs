//! CLI module for QuotaWatch
//!
//! Provides commands:
//! - `serve`: Poll providers and serve the JSON API (default)
//! - `summary`: Print usage summaries from the local database
//! - `cycles`: Print a quota's reset-cycle history
//! - `sessions`: List recent agent and usage sessions

use clap::{Parser, Subcommand};
use quotawatch_core::Provider;
use std::path::PathBuf;

pub mod quota;
pub mod sessions;

/// QuotaWatch CLI
#[derive(Parser, Debug)]
#[command(name = "quotawatch")]
#[command(about = "Track AI provider quotas across reset cycles")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the agents and the API server (default)
    Serve,
    /// Show usage summaries for a provider
    Summary {
        /// Provider name (synthetic, zai, copilot)
        #[arg(long, short)]
        provider: Provider,
        /// Only this quota
        #[arg(long, short)]
        quota: Option<String>,
        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show reset-cycle history for one quota
    Cycles {
        /// Provider name (synthetic, zai, copilot)
        #[arg(long, short)]
        provider: Provider,
        /// Quota name (e.g. subscription, premium_interactions)
        #[arg(long, short)]
        quota: String,
        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List recent agent and usage sessions
    Sessions {
        /// Number of sessions to show
        #[arg(long, short, default_value_t = 20)]
        limit: i64,
        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        None | Some(Commands::Serve) => crate::server::run().await,
        Some(Commands::Summary {
            provider,
            quota,
            json,
        }) => quota::run_summary(provider, quota.as_deref(), json).await,
        Some(Commands::Cycles {
            provider,
            quota,
            json,
        }) => quota::run_cycles(provider, &quota, json).await,
        Some(Commands::Sessions { limit, json }) => sessions::run(limit, json).await,
    }
}

/// Open the configured database for a read-only command
async fn open_store() -> anyhow::Result<quotawatch_store::SqliteStore> {
    let config = crate::server::load_config()?;
    crate::server::open_store(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_summary() {
        let cli = Cli::parse_from(["quotawatch", "summary", "--provider", "copilot"]);
        match cli.command {
            Some(Commands::Summary {
                provider, quota, ..
            }) => {
                assert_eq!(provider, Provider::Copilot);
                assert!(quota.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["quotawatch", "summary", "-p", "openai"]).is_err());
    }

    #[test]
    fn test_default_is_serve() {
        let cli = Cli::parse_from(["quotawatch", "--log-json"]);
        assert!(cli.command.is_none());
        assert!(cli.log_json);
    }
}
