//! Configuration management for logstore
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use logstore::config::LoggerConfig;
//!
//! let config = LoggerConfig::load().expect("Failed to load configuration");
//! println!("Keeping {} days of logs", config.retention.prune_limit_days);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `LOGSTORE__<section>__<key>`
//!
//! Examples:
//! - `LOGSTORE__STORE__PATH=/var/lib/myapp/logs`
//! - `LOGSTORE__LOGGING__FILTER_SEVERITY=debug`
//! - `LOGSTORE__RETENTION__PRUNE_FREQUENCY=15m`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/logstore.toml`.
//! This can be overridden using the `LOGSTORE_CONFIG` environment variable.
//!
//! Retention settings are not persisted in the store; every process starts
//! from whatever this configuration resolves to.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{LoggerConfig, LoggingConfig, RetentionConfig, StoreConfig};
pub use validation::ValidationError;
pub(crate) use validation::{validate_prune_frequency, validate_prune_limit};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl LoggerConfig {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`LOGSTORE__*`)
    /// 2. TOML file (default: `config/logstore.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
