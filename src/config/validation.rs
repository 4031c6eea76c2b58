use super::models::LoggerConfig;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("prune_limit_days must be a positive, finite number of days: {value}")]
    InvalidPruneLimit { value: f64 },

    #[error("prune_frequency must be greater than zero")]
    InvalidPruneFrequency,

    #[error("store.app_name must not be empty when no store.path is set")]
    EmptyAppName,
}

/// Validate the entire configuration
pub fn validate(config: &LoggerConfig) -> Result<(), ValidationError> {
    validate_store(config)?;
    validate_retention(config)?;
    Ok(())
}

fn validate_store(config: &LoggerConfig) -> Result<(), ValidationError> {
    if config.store.path.is_none() && config.store.app_name.trim().is_empty() {
        return Err(ValidationError::EmptyAppName);
    }
    Ok(())
}

pub(crate) fn validate_prune_limit(days: f64) -> Result<(), ValidationError> {
    if !days.is_finite() || days <= 0.0 {
        return Err(ValidationError::InvalidPruneLimit { value: days });
    }
    Ok(())
}

pub(crate) fn validate_prune_frequency(frequency: Duration) -> Result<(), ValidationError> {
    if frequency.is_zero() {
        return Err(ValidationError::InvalidPruneFrequency);
    }
    Ok(())
}

fn validate_retention(config: &LoggerConfig) -> Result<(), ValidationError> {
    validate_prune_limit(config.retention.prune_limit_days)?;

    validate_prune_frequency(config.retention.prune_frequency.as_duration())
}
