use serde::{Deserialize, Serialize};

/// Configuration for the session resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// After a successful remote sign-in, store the principal and a verifier
    /// of the secret so the same user can sign in while offline.
    pub remember_offline: bool,
}
