//! In-memory backends for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use confsync_types::{normalize_email, ConfigEntry, PrincipalId, Subscription};

use crate::error::{IdentityError, IdentityResult, RemoteError, RemoteResult};
use crate::identity::{IdentityService, ProfileRecord, VerifiedIdentity};
use crate::store::{ChangeCallback, RemoteConfigStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Subscribers = Arc<Mutex<BTreeMap<u64, ChangeCallback>>>;

/// An in-memory settings table with a reachability switch.
///
/// Upserts follow last-write-wins by `updated_at` and are echoed on the
/// change feed, as a hosted backend would do. [`MemoryConfigStore::push`]
/// simulates a write from another process.
pub struct MemoryConfigStore {
    rows: Mutex<HashMap<String, ConfigEntry>>,
    available: AtomicBool,
    subscribers: Subscribers,
    next_subscriber: AtomicU64,
    upserts: AtomicUsize,
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConfigStore {
    /// Creates a reachable, empty store.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            subscribers: Arc::new(Mutex::new(BTreeMap::new())),
            next_subscriber: AtomicU64::new(0),
            upserts: AtomicUsize::new(0),
        }
    }

    /// Makes every operation succeed (`true`) or fail as unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Inserts a row without notifying subscribers.
    pub fn seed(&self, entry: ConfigEntry) {
        lock(&self.rows).insert(entry.key.clone(), entry);
    }

    /// Stores a row written by another process and delivers it on the
    /// change feed.
    pub fn push(&self, entry: ConfigEntry) {
        lock(&self.rows).insert(entry.key.clone(), entry.clone());
        self.notify(entry);
    }

    /// Delivers a row on the change feed without storing it.
    pub fn deliver(&self, entry: ConfigEntry) {
        self.notify(entry);
    }

    /// Returns the stored row for `key`.
    pub fn row(&self, key: &str) -> Option<ConfigEntry> {
        lock(&self.rows).get(key).cloned()
    }

    /// Number of open change feed subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Number of accepted upsert calls.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    fn notify(&self, entry: ConfigEntry) {
        let callbacks: Vec<ChangeCallback> = lock(&self.subscribers).values().cloned().collect();
        for callback in callbacks {
            callback(entry.clone());
        }
    }

    fn ensure_available(&self) -> RemoteResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("memory store offline".into()))
        }
    }
}

#[async_trait]
impl RemoteConfigStore for MemoryConfigStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn probe(&self) -> RemoteResult<()> {
        self.ensure_available()
    }

    async fn read(&self, key: &str) -> RemoteResult<Option<ConfigEntry>> {
        self.ensure_available()?;
        Ok(self.row(key))
    }

    async fn upsert(&self, entry: &ConfigEntry) -> RemoteResult<ConfigEntry> {
        self.ensure_available()?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let stored = {
            let mut rows = lock(&self.rows);
            match rows.get(&entry.key) {
                Some(existing) if existing.is_newer_than(entry) => existing.clone(),
                _ => {
                    rows.insert(entry.key.clone(), entry.clone());
                    entry.clone()
                }
            }
        };
        self.notify(stored.clone());
        Ok(stored)
    }

    async fn subscribe(&self, on_change: ChangeCallback) -> RemoteResult<Subscription> {
        self.ensure_available()?;
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        lock(&self.subscribers).insert(id, on_change);
        let subscribers = Arc::downgrade(&self.subscribers);
        Ok(Subscription::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                lock(&subscribers).remove(&id);
            }
        }))
    }
}

struct MockUser {
    id: PrincipalId,
    email: String,
    secret: String,
}

/// An in-memory identity service with a reachability switch.
pub struct MemoryIdentityService {
    users: Mutex<HashMap<String, MockUser>>,
    profiles: Mutex<HashMap<PrincipalId, ProfileRecord>>,
    available: AtomicBool,
    profiles_available: AtomicBool,
    sign_outs: AtomicUsize,
}

impl Default for MemoryIdentityService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityService {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            profiles_available: AtomicBool::new(true),
            sign_outs: AtomicUsize::new(0),
        }
    }

    /// Registers credentials and returns the new user's ID.
    pub fn add_user(&self, email: &str, secret: &str) -> PrincipalId {
        let id = PrincipalId::new();
        self.add_user_with_id(id, email, secret);
        id
    }

    /// Registers credentials under a fixed ID.
    pub fn add_user_with_id(&self, id: PrincipalId, email: &str, secret: &str) {
        lock(&self.users).insert(
            normalize_email(email),
            MockUser {
                id,
                email: email.to_string(),
                secret: secret.to_string(),
            },
        );
    }

    /// Stores a profile row.
    pub fn add_profile(&self, profile: ProfileRecord) {
        lock(&self.profiles).insert(profile.id, profile);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes only the profile lookup fail as unavailable.
    pub fn set_profiles_available(&self, available: bool) {
        self.profiles_available.store(available, Ordering::SeqCst);
    }

    /// Number of remote sign-outs performed.
    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> IdentityResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(IdentityError::Unavailable("memory identity service offline".into()))
        }
    }
}

#[async_trait]
impl IdentityService for MemoryIdentityService {
    async fn verify(&self, identifier: &str, secret: &str) -> IdentityResult<VerifiedIdentity> {
        self.ensure_available()?;
        let users = lock(&self.users);
        match users.get(&normalize_email(identifier)) {
            Some(user) if user.secret == secret => Ok(VerifiedIdentity {
                user_id: user.id,
                email: user.email.clone(),
                access_token: format!("token-{}", user.id),
            }),
            _ => Err(IdentityError::Rejected),
        }
    }

    async fn fetch_profile(
        &self,
        identity: &VerifiedIdentity,
    ) -> IdentityResult<Option<ProfileRecord>> {
        self.ensure_available()?;
        if !self.profiles_available.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("profiles offline".into()));
        }
        Ok(lock(&self.profiles).get(&identity.user_id).cloned())
    }

    async fn sign_out(&self, _identity: &VerifiedIdentity) -> IdentityResult<()> {
        self.ensure_available()?;
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
