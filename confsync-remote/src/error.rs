//! Error types for the remote adapters.

use thiserror::Error;

/// Result type for settings store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors from the remote settings store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The backend could not be reached (network, 5xx).
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time.
    #[error("operation timed out")]
    Timeout,

    /// The backend answered but refused the request (4xx).
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered with something we could not decode.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The adapter was misconfigured.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RemoteError {
    /// Returns true if the error means the backend is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors from the identity service.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The credentials were not accepted.
    #[error("credentials rejected")]
    Rejected,

    /// The identity service could not be reached.
    #[error("identity service unavailable: {0}")]
    Unavailable(String),

    /// The identity service did not answer in time.
    #[error("operation timed out")]
    Timeout,

    /// The identity service answered with something we could not decode.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The adapter was misconfigured.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IdentityError {
    /// Returns true if the error means the service is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}
