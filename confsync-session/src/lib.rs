//! Session resolution for confsync.
//!
//! [`SessionResolver`] turns an email and secret into a
//! [`SessionPrincipal`](confsync_types::SessionPrincipal).
//!
//! # Design Principles
//!
//! - **Connectivity decides the path**: while the settings backend is
//!   reachable, credentials go to the remote identity service; while it is
//!   degraded, they are checked against the seeded offline accounts
//! - **Same shape either way**: callers cannot tell which path produced
//!   the principal
//! - **Uniform rejection**: unknown user, wrong secret, inactive account and
//!   unreachable service all yield [`SessionError::InvalidCredentials`]
//! - **No clear-text secrets**: offline accounts keep a salted Argon2id verifier only

mod config;
mod error;
mod resolver;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use resolver::{SessionResolver, SessionState};
