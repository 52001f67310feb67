//! Local persistent mirror for confsync.
//!
//! The mirror is pure storage: it keeps the last known value of every
//! configuration key plus the seeded offline account table, survives
//! process restarts, and never fails a read because of malformed local
//! state. Policy (when to trust it, when to overwrite it) lives in the
//! sync coordinator.
//!
//! Two backends are provided:
//! - [`SqliteMirror`]: one SQLite file, used in production
//! - [`MemoryMirror`]: process-local, used in tests

mod credentials;
mod error;
mod memory;
mod mirror;
mod sqlite;

pub use credentials::{CredentialStore, OfflineAccount, SALT_SIZE, VERIFIER_SIZE};
pub use error::{CacheError, CacheResult};
pub use memory::MemoryMirror;
pub use mirror::{LocalMirror, MirrorState, MirroredEntry};
pub use sqlite::SqliteMirror;
