use ::config::{Config as ConfigLoader, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::ConfigError;

/// Environment prefix for overrides, e.g. `LSRANKS__SYNC__SOURCES`
pub const ENV_PREFIX: &str = "LSRANKS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Source URLs, separated by commas and/or newlines
    pub sources: String,
    /// Cron expression (with seconds) for in-process scheduled runs
    pub schedule: Option<String>,
    pub run_missed_immediately: bool,
    pub batch_size: usize,
    pub max_in_flight_batches: usize,
    pub fetch_timeout_secs: u64,
    pub fetch_retries: u32,
    pub retry_backoff_ms: u64,
    /// Reject candidates whose gender could not be detected
    pub strict_gender: bool,
    /// Include sample payloads in every run summary
    pub debug_samples: bool,
    pub sample_size: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub sync_secret: Option<String>,
}

impl AuthConfig {
    /// The sync secret, with a blank value treated as unset
    pub fn secret(&self) -> Option<&str> {
        self.sync_secret.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./lsranks.db".to_string(),
            max_connections: Some(5),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sources: String::new(),
            schedule: None,
            run_missed_immediately: true,
            batch_size: 500,
            max_in_flight_batches: 4,
            fetch_timeout_secs: 30,
            fetch_retries: 2,
            retry_backoff_ms: 500,
            strict_gender: true,
            debug_samples: false,
            sample_size: 5,
            user_agent: format!("lsranks-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SyncConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Config {
    /// Load configuration from an optional TOML file layered under
    /// `LSRANKS__SECTION__KEY` environment variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            Self::write_default(path);
        }

        let loader = ConfigLoader::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = loader.try_deserialize()?;
        config.apply_legacy_env(|key| std::env::var(key).ok());
        debug!("Configuration loaded (file: {})", path);
        Ok(config)
    }

    /// Write the default configuration so operators have a file to edit.
    /// Failure is logged and otherwise ignored.
    fn write_default(path: &str) {
        let written = toml::to_string_pretty(&Config::default())
            .map_err(|e| e.to_string())
            .and_then(|contents| fs::write(path, contents).map_err(|e| e.to_string()));

        match written {
            Ok(()) => info!("Created default configuration file: {}", path),
            Err(e) => warn!("Could not write default configuration to {}: {}", path, e),
        }
    }

    /// Fill unset values from the variable names older deployments used.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.auth.sync_secret.as_deref().map_or(true, str::is_empty) {
            self.auth.sync_secret = ["SYNC_SECRET", "CRON_SECRET"]
                .iter()
                .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()));
        }

        if self.sync.sources.trim().is_empty() {
            if let Some(sources) = lookup("ILSF_RECORDS_URL") {
                self.sync.sources = sources;
            }
        }
    }
}

/// Settings for one sync run, validated when the run is invoked.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub sources: Vec<String>,
    pub batch_size: usize,
    pub max_in_flight_batches: usize,
    pub strict_gender: bool,
    pub debug_samples: bool,
    pub sample_size: usize,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        if config.database.url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let sources = parse_source_list(&config.sync.sources)?;
        if sources.is_empty() {
            return Err(ConfigError::MissingSources);
        }

        if config.sync.batch_size == 0 {
            return Err(ConfigError::invalid_value("sync.batch_size", "must be at least 1"));
        }

        Ok(Self {
            sources,
            batch_size: config.sync.batch_size,
            max_in_flight_batches: config.sync.max_in_flight_batches.max(1),
            strict_gender: config.sync.strict_gender,
            debug_samples: config.sync.debug_samples,
            sample_size: config.sync.sample_size,
        })
    }
}

/// Split a comma- or newline-separated source list, dropping blanks and
/// duplicates while keeping the configured order.
pub fn parse_source_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut sources: Vec<String> = Vec::new();

    for entry in raw.split(|c: char| matches!(c, ',' | '\n' | '\r')) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let url = Url::parse(entry).map_err(|e| ConfigError::InvalidSourceUrl {
            url: entry.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidSourceUrl {
                url: entry.to_string(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if !sources.iter().any(|s| s == entry) {
            sources.push(entry.to_string());
        }
    }

    Ok(sources)
}
