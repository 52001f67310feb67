//! Error types for the sync layer.

use confsync_cache::CacheError;
use confsync_remote::RemoteError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// An unreachable store never reaches callers of the public write path;
/// it is absorbed into the connectivity state. Callers see local
/// persistence failures and writes a reachable store refused.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local mirror rejected a write.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The remote store failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}
