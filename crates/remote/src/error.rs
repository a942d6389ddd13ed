//! Error types for the remote store client.

use thiserror::Error;

/// Result type alias for remote store operations.
pub type Result<T> = std::result::Result<T, RemoteStoreError>;

/// Retry policy class for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
}

/// Errors that can occur talking to the hosted database service.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// Transport-level failure (timeout, refused connection, DNS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with an error status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The generic statement cannot be expressed through the service's
    /// row-filter API.
    #[error("Unsupported query shape: {0}")]
    UnsupportedQuery(String),
}

impl RemoteStoreError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedQuery(message.into())
    }

    /// Classify for retry policy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
                500..=599 => RetryClass::Retryable,
                _ => RetryClass::Permanent,
            },
            Self::Http(_) => RetryClass::Retryable,
            Self::Json(_) | Self::InvalidRequest(_) | Self::UnsupportedQuery(_) => {
                RetryClass::Permanent
            }
        }
    }

    /// True when the endpoint itself is unreachable — the signal the
    /// adapter uses to switch to offline-path routing. An error status
    /// other than a dead gateway means the service is reachable and is NOT
    /// a connection failure.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Api { status, .. } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<RemoteStoreError> for pulperia_core::Error {
    fn from(err: RemoteStoreError) -> Self {
        if err.is_connection() {
            return pulperia_core::Error::connection(err.to_string());
        }
        match err {
            RemoteStoreError::Json(e) => pulperia_core::Error::internal(e.to_string()),
            other => pulperia_core::Error::query(other.to_string()),
        }
    }
}
