//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // prefix_separator("_") makes QUOTAWATCH_SERVER__PORT work (single _ after prefix).
        .add_source(
            Environment::with_prefix("QUOTAWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9274);
        assert_eq!(config.polling.interval_secs, 60);
        assert_eq!(config.polling.alert_threshold, Some(90.0));
        assert_eq!(config.polling.session_idle_secs, 600);
        assert!(config.providers.copilot.enabled);
        assert!(config.providers.zai.api_key.is_none());
    }

    #[test]
    fn test_provider_key_from_toml() {
        let toml = r#"
            [providers.synthetic]
            api_key = "syn_abcdef123456"
            base_url = "http://localhost:9999"

            [providers.zai]
            enabled = false
        "#;
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.providers.synthetic.api_key.is_some());
        assert_eq!(
            config.providers.synthetic.base_url.as_deref(),
            Some("http://localhost:9999")
        );
        assert!(!config.providers.zai.enabled);
        // Secrets never show up in Debug output
        assert!(!format!("{config:?}").contains("abcdef"));
    }
}
