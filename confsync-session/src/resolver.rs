//! The sign-in state machine.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use confsync_cache::{CredentialStore, OfflineAccount};
use confsync_remote::{IdentityService, VerifiedIdentity};
use confsync_types::{ConnectivityState, Role, SessionPrincipal};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};

/// Compared against when an offline lookup finds no account, so that
/// unknown users and wrong secrets cost the same work.
static DUMMY_ACCOUNT: LazyLock<Option<OfflineAccount>> = LazyLock::new(|| {
    OfflineAccount::new(
        SessionPrincipal::new("", "nobody@invalid", Role::Guardian).with_active(false),
        "not-a-real-secret",
    )
    .ok()
});

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where the resolver is in the sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated(Arc<SessionPrincipal>),
    Rejected,
}

impl SessionState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Resolves credentials into a [`SessionPrincipal`].
///
/// The path is picked per attempt from the observed connectivity state:
/// connected sign-ins go to the identity service, degraded ones to the
/// seeded offline accounts.
pub struct SessionResolver {
    identity: Arc<dyn IdentityService>,
    credentials: Arc<dyn CredentialStore>,
    connectivity: watch::Receiver<ConnectivityState>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    /// Remote session to end on sign-out, if the current one came from there.
    remote_session: Mutex<Option<VerifiedIdentity>>,
}

impl SessionResolver {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        credentials: Arc<dyn CredentialStore>,
        connectivity: watch::Receiver<ConnectivityState>,
        config: SessionConfig,
    ) -> Self {
        Self {
            identity,
            credentials,
            connectivity,
            config,
            state: Mutex::new(SessionState::Unauthenticated),
            remote_session: Mutex::new(None),
        }
    }

    /// Signs in with `identifier` (an email) and `secret`.
    ///
    /// Replaces any current session. Every failure is reported as
    /// [`SessionError::InvalidCredentials`].
    pub async fn sign_in(
        &self,
        identifier: &str,
        secret: &str,
    ) -> SessionResult<Arc<SessionPrincipal>> {
        *lock(&self.state) = SessionState::Authenticating;
        *lock(&self.remote_session) = None;

        let mode = *self.connectivity.borrow();
        let result = match mode {
            ConnectivityState::Connected => self.sign_in_remote(identifier, secret).await,
            ConnectivityState::Degraded => self.sign_in_offline(identifier, secret),
        };

        match result {
            Some(principal) => {
                info!(
                    "Signed in principal {} with role {}",
                    principal.id, principal.role
                );
                let principal = Arc::new(principal);
                *lock(&self.state) = SessionState::Authenticated(principal.clone());
                Ok(principal)
            }
            None => {
                info!("Sign-in rejected");
                *lock(&self.state) = SessionState::Rejected;
                Err(SessionError::InvalidCredentials)
            }
        }
    }

    /// Ends the current session. When it came from the identity service and
    /// the backend is reachable, the remote session is closed as well;
    /// failures there are logged and ignored.
    pub async fn sign_out(&self) {
        let remote = lock(&self.remote_session).take();
        *lock(&self.state) = SessionState::Unauthenticated;

        let connected = self.connectivity.borrow().is_connected();
        if let Some(identity) = remote.filter(|_| connected) {
            if let Err(e) = self.identity.sign_out(&identity).await {
                warn!("Remote sign-out failed: {}", e);
            }
        }
        debug!("Signed out");
    }

    /// The signed-in principal, if any.
    pub fn current(&self) -> Option<Arc<SessionPrincipal>> {
        match &*lock(&self.state) {
            SessionState::Authenticated(principal) => Some(principal.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.state).clone()
    }

    /// Stores an offline account for `principal`, replacing any account
    /// with the same email.
    pub fn seed_account(&self, principal: SessionPrincipal, secret: &str) -> SessionResult<()> {
        let account = OfflineAccount::new(principal, secret)?;
        self.credentials.seed_account(&account)?;
        Ok(())
    }

    async fn sign_in_remote(&self, identifier: &str, secret: &str) -> Option<SessionPrincipal> {
        let verified = match self.identity.verify(identifier, secret).await {
            Ok(verified) => verified,
            Err(e) => {
                debug!("Identity verification failed: {}", e);
                return None;
            }
        };

        let principal = match self.identity.fetch_profile(&verified).await {
            Ok(Some(profile)) => profile.into_principal(),
            Ok(None) => {
                debug!("No profile for {}; trying local accounts", verified.user_id);
                self.credentials.find_account(&verified.email)?.principal
            }
            Err(e) => {
                debug!("Profile lookup failed ({}); trying local accounts", e);
                self.credentials.find_account(&verified.email)?.principal
            }
        };

        if !principal.active {
            return None;
        }

        if self.config.remember_offline {
            let remembered = OfflineAccount::new(principal.clone(), secret)
                .and_then(|account| self.credentials.seed_account(&account));
            if let Err(e) = remembered {
                warn!("Failed to remember offline account: {}", e);
            }
        }

        *lock(&self.remote_session) = Some(verified);
        Some(principal)
    }

    fn sign_in_offline(&self, identifier: &str, secret: &str) -> Option<SessionPrincipal> {
        let account = self.credentials.find_account(identifier);
        let matched = match &account {
            Some(account) => account.verify_secret(secret),
            None => {
                if let Some(dummy) = DUMMY_ACCOUNT.as_ref() {
                    let _ = dummy.verify_secret(secret);
                }
                false
            }
        };

        let principal = account?.principal;
        (matched && principal.active).then_some(principal)
    }
}
