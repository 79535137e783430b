use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "worker-lifecycle.toml";

/// Prefix for environment overrides, e.g. `WORKER_LIFECYCLE_DATABASE__URL`
pub const ENV_PREFIX: &str = "WORKER_LIFECYCLE";

/// Main configuration structure for the worker lifecycle service
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Database settings
    pub database: DatabaseConfig,
    /// Driver settings
    pub lifecycle: DriverConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://worker-lifecycle.db".to_string(),
            max_connections: 5,
            auto_migrate: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    /// Seconds between lifecycle ticks
    pub interval_seconds: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
        }
    }
}

impl DriverConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive
    pub log_level: String,
    /// Emit JSON logs instead of plain text
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. worker-lifecycle.toml in the working directory
    /// 3. An explicit configuration file
    /// 4. Environment variables (prefixed with WORKER_LIFECYCLE_)
    pub fn load(explicit_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&LifecycleConfig::default())?);

        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
        }

        if let Some(path) = explicit_file {
            if !path.exists() {
                bail!("Configuration file {} does not exist", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: LifecycleConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            bail!("database.url must not be empty");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be greater than zero");
        }
        if self.lifecycle.interval_seconds == 0 {
            bail!("lifecycle.interval_seconds must be greater than zero");
        }
        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
