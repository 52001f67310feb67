//! Error types for session resolution.

use confsync_cache::CacheError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while resolving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Sign-in failed. Deliberately carries no detail: unknown user, wrong
    /// secret, inactive account and unreachable service all look the same.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The offline account table could not be written.
    #[error("storage error: {0}")]
    Storage(#[from] CacheError),
}
