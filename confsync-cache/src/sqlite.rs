//! SQLite-backed mirror.
//!
//! Uses one file holding two tables: `config_mirror` for settings and
//! `offline_accounts` for the seeded credential table.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use confsync_types::{ConfigEntry, SessionPrincipal};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::credentials::{account_key, CredentialStore, OfflineAccount};
use crate::error::{CacheError, CacheResult};
use crate::mirror::{LocalMirror, MirrorState, MirroredEntry};

/// Persistent mirror backed by SQLite.
pub struct SqliteMirror {
    conn: Arc<Mutex<Connection>>,
}

type RawEntry = (String, String, String, i64);

impl SqliteMirror {
    /// Opens (or creates) a mirror at the given path, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!("Opened local mirror at {}", path.display());
        Self::with_connection(conn)
    }

    /// Opens an in-memory mirror (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> CacheResult<Self> {
        let mirror = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        mirror.init_schema()?;
        Ok(mirror)
    }

    fn init_schema(&self) -> CacheResult<()> {
        self.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS config_mirror (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                pending INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS offline_accounts (
                email TEXT PRIMARY KEY,
                principal TEXT NOT NULL,
                salt TEXT NOT NULL,
                verifier TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_raw(&self, key: &str) -> CacheResult<Option<RawEntry>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT key, value, updated_at, pending FROM config_mirror WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        Ok(row)
    }

    fn read_all_raw(&self) -> CacheResult<Vec<RawEntry>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT key, value, updated_at, pending FROM config_mirror ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn decode_entry((key, value, updated_at, pending): RawEntry) -> CacheResult<MirroredEntry> {
    let value = serde_json::from_str(&value)
        .map_err(|e| CacheError::Corrupt(format!("value for '{key}': {e}")))?;
    let updated_at: DateTime<Utc> = updated_at
        .parse()
        .map_err(|e| CacheError::Corrupt(format!("updated_at for '{key}': {e}")))?;
    let state = if pending != 0 {
        MirrorState::Pending
    } else {
        MirrorState::Confirmed
    };
    Ok(MirroredEntry {
        entry: ConfigEntry::with_timestamp(key, value, updated_at),
        state,
    })
}

impl LocalMirror for SqliteMirror {
    fn get(&self, key: &str) -> Option<MirroredEntry> {
        let raw = match self.read_raw(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read mirrored key '{}': {}", key, e);
                return None;
            }
        };
        match decode_entry(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Treating mirrored key '{}' as missing: {}", key, e);
                None
            }
        }
    }

    fn put(&self, entry: &MirroredEntry) -> CacheResult<()> {
        let value = serde_json::to_string(&entry.entry.value)?;
        self.lock().execute(
            "INSERT OR REPLACE INTO config_mirror (key, value, updated_at, pending) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.entry.key,
                value,
                entry.entry.updated_at.to_rfc3339(),
                i64::from(entry.is_pending()),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.lock()
            .execute("DELETE FROM config_mirror WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn entries(&self) -> Vec<MirroredEntry> {
        let raw = match self.read_all_raw() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to list mirrored entries: {}", e);
                return Vec::new();
            }
        };
        raw.into_iter()
            .filter_map(|row| match decode_entry(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping corrupt mirrored entry: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl CredentialStore for SqliteMirror {
    fn find_account(&self, email: &str) -> Option<OfflineAccount> {
        let key = account_key(email);
        let row: Option<(String, String, String)> = {
            let conn = self.lock();
            match conn
                .query_row(
                    "SELECT principal, salt, verifier FROM offline_accounts WHERE email = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
            {
                Ok(row) => row,
                Err(e) => {
                    warn!("Failed to read offline account: {}", e);
                    return None;
                }
            }
        };

        let (principal, salt, verifier) = row?;
        match serde_json::from_str::<SessionPrincipal>(&principal) {
            Ok(principal) => Some(OfflineAccount::from_parts(principal, salt, verifier)),
            Err(e) => {
                warn!("Treating corrupt offline account as missing: {}", e);
                None
            }
        }
    }

    fn seed_account(&self, account: &OfflineAccount) -> CacheResult<()> {
        let principal = serde_json::to_string(&account.principal)?;
        self.lock().execute(
            "INSERT OR REPLACE INTO offline_accounts (email, principal, salt, verifier) VALUES (?1, ?2, ?3, ?4)",
            params![
                account.email_key(),
                principal,
                account.salt(),
                account.verifier()
            ],
        )?;
        Ok(())
    }

    fn remove_account(&self, email: &str) -> CacheResult<()> {
        self.lock().execute(
            "DELETE FROM offline_accounts WHERE email = ?1",
            params![account_key(email)],
        )?;
        Ok(())
    }
}
