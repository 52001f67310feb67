//! Settings synchronization for confsync.
//!
//! This crate owns the answer to "what is the current value of key K" and
//! "how does a write reach durable storage":
//!
//! - [`SyncCoordinator`]: reads come from the local mirror, writes go to
//!   the remote store when it is reachable and to the mirror either way,
//!   and server pushes are applied through the same serialized path
//! - [`ChangeNotifier`]: in-process fan-out of "key changed" events
//! - [`BroadcastTransport`]: a second [`ChangeTransport`] over a tokio
//!   broadcast channel, for forwarding changes to other windows
//!
//! Remote failures are never surfaced as errors from reads; they only flip
//! the coordinator's [`ConnectivityState`](confsync_types::ConnectivityState).

mod broadcast;
mod config;
mod coordinator;
mod error;
mod notifier;

pub use broadcast::BroadcastTransport;
pub use config::SyncConfig;
pub use coordinator::SyncCoordinator;
pub use error::{SyncError, SyncResult};
pub use notifier::{ChangeHandler, ChangeNotifier, ChangeTransport};
