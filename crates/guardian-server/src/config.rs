//! Server configuration, loaded from TOML. Every field has a default
//! so a missing file or an empty `[section]` still yields a runnable
//! config.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stripe: StripeConfig,
    pub notify: NotifyConfig,
    pub backfill: BackfillConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Loads the file when it exists, otherwise runs on defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_port: u16,
    pub machine_id: i32,
    pub node_id: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            machine_id: 1,
            node_id: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; overrides `data_dir` when set.
    pub url: Option<String>,
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            data_dir: "./data".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn effective_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("sqlite://{}/guardian.db?mode=rwc", self.data_dir),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: String,
    /// Pause payouts automatically on alert classes that warrant it.
    pub auto_pause: bool,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            api_base: "https://api.stripe.com".to_string(),
            auto_pause: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub max_attempts: u32,
    pub poll_interval_secs: u64,
    pub lease_secs: i64,
    pub base_backoff_secs: f64,
    /// How long resolved rule configs are cached per account.
    pub config_cache_ttl_secs: u64,
    pub email: EmailConfig,
    pub slack: SlackConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            poll_interval_secs: 2,
            lease_secs: 300,
            base_backoff_secs: 1.0,
            config_cache_ttl_secs: 600,
            email: EmailConfig::default(),
            slack: SlackConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    /// Fallback recipient for accounts with no address of their own.
    pub default_to: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            from: "guardian@localhost".to_string(),
            default_to: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub enabled: bool,
    pub default_webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_webhook_url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    pub lookback_days: i64,
    pub page_size: u32,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            page_size: 100,
        }
    }
}
