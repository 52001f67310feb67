//! Identity service abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confsync_types::{PrincipalId, Role, SessionPrincipal};
use serde::{Deserialize, Serialize};

use crate::error::IdentityResult;

/// Proof that the identity service accepted a credential pair.
#[derive(Clone)]
pub struct VerifiedIdentity {
    pub user_id: PrincipalId,
    pub email: String,
    pub access_token: String,
}

impl std::fmt::Debug for VerifiedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifiedIdentity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// A row of the remote profiles table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: PrincipalId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl ProfileRecord {
    /// Builds the profile row that describes an existing principal.
    pub fn from_principal(principal: &SessionPrincipal) -> Self {
        Self {
            id: principal.id,
            name: principal.display_name.clone(),
            email: principal.email.clone(),
            role: principal.role,
            phone: principal.phone.clone(),
            active: principal.active,
            created_at: principal.created_at,
        }
    }

    /// Normalizes the row into a session principal.
    pub fn into_principal(self) -> SessionPrincipal {
        SessionPrincipal {
            id: self.id,
            display_name: self.name,
            email: self.email,
            role: self.role,
            phone: self.phone,
            active: self.active,
            created_at: self.created_at,
        }
    }
}

/// Remote identity verification plus the secondary profile lookup.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Verifies a credential pair.
    async fn verify(&self, identifier: &str, secret: &str) -> IdentityResult<VerifiedIdentity>;

    /// Looks up the profile of a verified identity. `Ok(None)` means the
    /// identity exists but has no profile yet.
    async fn fetch_profile(&self, identity: &VerifiedIdentity)
    -> IdentityResult<Option<ProfileRecord>>;

    /// Ends the remote session for `identity`.
    async fn sign_out(&self, identity: &VerifiedIdentity) -> IdentityResult<()>;
}
