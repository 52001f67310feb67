//! Seeded offline accounts.
//!
//! When the remote identity service is unreachable, sign-in is checked
//! against this table. Secrets are never stored in clear text: each
//! account keeps a random salt and an Argon2id verifier derived from it.

use argon2::{Algorithm, Argon2, Params, Version};
use confsync_types::{normalize_email, SessionPrincipal};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{CacheError, CacheResult};

/// Size of the per-account salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Size of the derived verifier in bytes.
pub const VERIFIER_SIZE: usize = 32;

// Argon2id cost, OWASP 2023 minimums.
const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

/// A locally seeded credential record.
#[derive(Clone, Serialize, Deserialize)]
pub struct OfflineAccount {
    pub principal: SessionPrincipal,
    salt: String,
    verifier: String,
}

impl OfflineAccount {
    /// Creates an account for `principal` with a fresh random salt.
    pub fn new(principal: SessionPrincipal, secret: &str) -> CacheResult<Self> {
        let mut salt = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let verifier = derive_verifier(secret, &salt)?;
        Ok(Self {
            principal,
            salt: hex::encode(salt),
            verifier: hex::encode(verifier),
        })
    }

    /// Rebuilds an account from persisted parts.
    pub fn from_parts(principal: SessionPrincipal, salt: String, verifier: String) -> Self {
        Self {
            principal,
            salt,
            verifier,
        }
    }

    /// Lookup key (lower-cased email).
    pub fn email_key(&self) -> String {
        self.principal.normalized_email()
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// Derives a verifier from `secret` and compares it with the stored one
    /// in constant time. Undecodable stored parts never match.
    pub fn verify_secret(&self, secret: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (hex::decode(&self.salt), hex::decode(&self.verifier))
        else {
            return false;
        };
        let Ok(candidate) = derive_verifier(secret, &salt) else {
            return false;
        };
        if candidate.len() != expected.len() {
            return false;
        }
        candidate[..].ct_eq(&expected[..]).into()
    }
}

impl std::fmt::Debug for OfflineAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineAccount")
            .field("principal", &self.principal)
            .field("verifier", &"[REDACTED]")
            .finish()
    }
}

fn derive_verifier(secret: &str, salt: &[u8]) -> CacheResult<[u8; VERIFIER_SIZE]> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(VERIFIER_SIZE))
        .map_err(|e| CacheError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut verifier = [0u8; VERIFIER_SIZE];
    argon2
        .hash_password_into(secret.as_bytes(), salt, &mut verifier)
        .map_err(|e| CacheError::KeyDerivation(e.to_string()))?;
    Ok(verifier)
}

/// Storage for seeded offline accounts, keyed by normalized email.
pub trait CredentialStore: Send + Sync {
    /// Finds the account for `email`. Undecodable rows read as missing.
    fn find_account(&self, email: &str) -> Option<OfflineAccount>;

    /// Inserts or replaces an account.
    fn seed_account(&self, account: &OfflineAccount) -> CacheResult<()>;

    /// Removes an account. Removing a missing account is a no-op.
    fn remove_account(&self, email: &str) -> CacheResult<()>;
}

pub(crate) fn account_key(email: &str) -> String {
    normalize_email(email)
}
