use std::path::PathBuf;

use thiserror::Error;

/// Underlying cause of a store failure
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Location is already open in this process")]
    InUse,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable at {}: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error("Store corrupt: {0}")]
    Corrupt(String),

    #[error("Write failed: {0}")]
    WriteFailed(#[source] BackendError),

    #[error("Query failed: {0}")]
    QueryFailed(#[source] BackendError),

    #[error("Store is not open")]
    NotOpen,
}

impl StoreError {
    pub(crate) fn unavailable(path: &std::path::Path, source: impl Into<BackendError>) -> Self {
        StoreError::Unavailable {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub(crate) fn write(source: impl Into<BackendError>) -> Self {
        StoreError::WriteFailed(source.into())
    }

    pub(crate) fn query(source: impl Into<BackendError>) -> Self {
        StoreError::QueryFailed(source.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
