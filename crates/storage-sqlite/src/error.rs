//! Storage error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema could not be applied on first open.
    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    /// The store's worker thread is gone; no further operations possible.
    #[error("Local store is closed")]
    Closed,

    #[error("{0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for pulperia_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Sqlite(e) => pulperia_core::Error::query(e.to_string()),
            StorageError::InvalidArgument(m) => pulperia_core::Error::query(m),
            other => pulperia_core::Error::internal(other.to_string()),
        }
    }
}
