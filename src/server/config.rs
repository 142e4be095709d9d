//! Server configuration types

use quotawatch_core::Provider;
use quotawatch_providers::client::DEFAULT_TIMEOUT;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    /// Directory holding the database (defaults to `~/.quotawatch`)
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(quotawatch_store::default_data_dir)
    }

    /// Path to the SQLite database
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("quotawatch.db")
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9274
}

/// Polling loop settings shared by every agent
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub alert_threshold: Option<f64>,
    /// Raw snapshot retention in days; 0 disables pruning
    #[serde(default)]
    pub retention_days: u32,
    /// Idle seconds that close a usage session; 0 disables usage sessions
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            alert_threshold: None,
            retention_days: 0,
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_session_idle_secs() -> u64 {
    600
}

/// Per-provider settings
#[derive(Debug, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub synthetic: ProviderConfig,
    #[serde(default)]
    pub zai: ProviderConfig,
    #[serde(default)]
    pub copilot: ProviderConfig,
}

impl ProvidersConfig {
    /// Settings for one provider
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Synthetic => &self.synthetic,
            Provider::Zai => &self.zai,
            Provider::Copilot => &self.copilot,
        }
    }

    /// Credential for `provider` from config, falling back to its environment variable
    pub fn credential(&self, provider: Provider) -> Option<SecretString> {
        self.credential_with(provider, |var| std::env::var(var).ok())
    }

    /// Like [`Self::credential`], with an explicit environment lookup
    pub fn credential_with(
        &self,
        provider: Provider,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<SecretString> {
        if let Some(key) = &self.get(provider).api_key {
            return Some(SecretString::from(key.expose_secret().to_string()));
        }
        lookup(credential_env_var(provider))
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from)
    }
}

/// Environment variable holding a provider's credential
pub fn credential_env_var(provider: Provider) -> &'static str {
    match provider {
        Provider::Synthetic => "SYNTHETIC_API_KEY",
        Provider::Zai => "ZAI_API_KEY",
        Provider::Copilot => "COPILOT_TOKEN",
    }
}

/// One provider's settings
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    /// Overrides the provider's public API host
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from))
}
