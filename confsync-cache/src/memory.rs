//! In-memory mirror.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::credentials::{account_key, CredentialStore, OfflineAccount};
use crate::error::CacheResult;
use crate::mirror::{LocalMirror, MirroredEntry};

/// A mirror that lives only as long as the process. Intended for tests and
/// for consumers that do not need persistence.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    entries: RwLock<BTreeMap<String, MirroredEntry>>,
    accounts: RwLock<HashMap<String, OfflineAccount>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalMirror for MemoryMirror {
    fn get(&self, key: &str) -> Option<MirroredEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, entry: &MirroredEntry) -> CacheResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.key().to_string(), entry.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn entries(&self) -> Vec<MirroredEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl CredentialStore for MemoryMirror {
    fn find_account(&self, email: &str) -> Option<OfflineAccount> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&account_key(email))
            .cloned()
    }

    fn seed_account(&self, account: &OfflineAccount) -> CacheResult<()> {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.email_key(), account.clone());
        Ok(())
    }

    fn remove_account(&self, email: &str) -> CacheResult<()> {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&account_key(email));
        Ok(())
    }
}
