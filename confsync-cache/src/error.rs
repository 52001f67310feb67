//! Error types for the local mirror.

use thiserror::Error;

/// Result type for mirror operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in mirror operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted row could not be decoded.
    #[error("corrupt entry: {0}")]
    Corrupt(String),

    /// Deriving a secret verifier failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}
