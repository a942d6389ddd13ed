//! Error taxonomy shared across the workspace.

use thiserror::Error;

/// Result type alias used throughout the core crate and its consumers.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to feature services.
///
/// Store-level crates define their own error enums and convert into this one
/// at the crate boundary, so callers never match on driver types.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed SQL, constraint violation or driver rejection at a store.
    /// Not retried automatically.
    #[error("Query error: {0}")]
    Query(String),

    /// The remote endpoint could not be reached. Caught at the adapter
    /// boundary to trigger offline-path routing.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Business-rule rejection from a feature service.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// A stored row is missing a column or holds a value the domain type
    /// cannot represent.
    #[error("Row mapping error: {0}")]
    Mapping(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when the failure indicates the remote endpoint is unreachable,
    /// as opposed to having rejected the request.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
