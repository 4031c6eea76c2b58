use thiserror::Error;

use crate::config::{ConfigError, ValidationError};
use crate::serializer::SerializerError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error(transparent)]
    Store(StoreError),

    #[error("Logger is not open")]
    NotOpen,

    #[error("Logger worker has stopped")]
    WorkerStopped,

    #[error("Failed to start logger worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("No default store location available on this platform")]
    NoDefaultLocation,

    #[error("Invalid setting: {0}")]
    InvalidSetting(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<StoreError> for LoggerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotOpen => LoggerError::NotOpen,
            other => LoggerError::Store(other),
        }
    }
}

impl From<SerializerError> for LoggerError {
    fn from(value: SerializerError) -> Self {
        match value {
            SerializerError::Spawn(e) => LoggerError::WorkerSpawn(e),
            SerializerError::Stopped | SerializerError::JobPanicked => LoggerError::WorkerStopped,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoggerError>;
