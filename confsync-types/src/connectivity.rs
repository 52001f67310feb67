//! Connectivity state and write outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the remote store is currently trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// The remote store answered the last operation.
    Connected,
    /// Only the local mirror is trusted.
    Degraded,
}

impl ConnectivityState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// How far a `set` got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Accepted by the remote store and mirrored locally.
    Synced,
    /// Applied to the local mirror only; not yet durable remotely.
    SavedLocally,
}

impl WriteOutcome {
    pub fn is_durable(self) -> bool {
        matches!(self, Self::Synced)
    }
}
