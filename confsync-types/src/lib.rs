//! Core type definitions for confsync.
//!
//! This crate defines the plain data shared by every layer of the
//! configuration core:
//! - Configuration entries and the well-known setting keys
//! - Connectivity state and write outcomes reported by the coordinator
//! - Session principals issued by the session resolver
//! - Explicit subscription handles used by every subscribe-style API
//!
//! Nothing here performs I/O.

mod connectivity;
mod entry;
mod ids;
mod principal;
mod subscription;

pub use connectivity::{ConnectivityState, WriteOutcome};
pub use entry::{keys, ConfigChange, ConfigEntry};
pub use ids::PrincipalId;
pub use principal::{normalize_email, Role, SessionPrincipal};
pub use subscription::Subscription;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid role: {0}")]
    InvalidRole(String),
}
