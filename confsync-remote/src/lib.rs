//! Remote adapters for confsync.
//!
//! Two seams talk to the hosted backend:
//! - [`RemoteConfigStore`]: point reads, upserts and a push change feed
//!   over the settings table
//! - [`IdentityService`]: credential verification and profile lookup
//!
//! Every failure that means "the backend could not be reached" is reported
//! as an unavailability error so callers can treat it as a connectivity
//! signal rather than a logic error.
//!
//! Implementations:
//! - [`rest`]: PostgREST / GoTrue style HTTP backend via `reqwest`
//! - [`mock`]: in-memory backends with a reachability switch

mod error;
mod identity;
pub mod mock;
pub mod rest;
mod store;

pub use error::{IdentityError, IdentityResult, RemoteError, RemoteResult};
pub use identity::{IdentityService, ProfileRecord, VerifiedIdentity};
pub use rest::{RestConfig, RestConfigStore, RestIdentityService};
pub use store::{ChangeCallback, RemoteConfigStore};
