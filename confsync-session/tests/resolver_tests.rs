use std::sync::Arc;

use confsync_cache::{CredentialStore, MemoryMirror};
use confsync_remote::mock::{MemoryConfigStore, MemoryIdentityService};
use confsync_remote::ProfileRecord;
use confsync_session::{SessionConfig, SessionError, SessionResolver, SessionState};
use confsync_sync::{SyncConfig, SyncCoordinator};
use confsync_types::{ConnectivityState, Role, SessionPrincipal};
use pretty_assertions::assert_eq;
use tokio::sync::watch;

struct Fixture {
    identity: Arc<MemoryIdentityService>,
    accounts: Arc<MemoryMirror>,
    connectivity: watch::Sender<ConnectivityState>,
    resolver: SessionResolver,
}

fn fixture(state: ConnectivityState, config: SessionConfig) -> Fixture {
    let identity = Arc::new(MemoryIdentityService::new());
    let accounts = Arc::new(MemoryMirror::new());
    let (connectivity, receiver) = watch::channel(state);
    let resolver = SessionResolver::new(identity.clone(), accounts.clone(), receiver, config);
    Fixture {
        identity,
        accounts,
        connectivity,
        resolver,
    }
}

fn admin() -> SessionPrincipal {
    SessionPrincipal::new("Diretora Ana", "admin@escola.com", Role::Admin)
}

/// Registers `principal` with the identity service, with a profile row.
fn register_remote(identity: &MemoryIdentityService, principal: &SessionPrincipal, secret: &str) {
    identity.add_user_with_id(principal.id, &principal.email, secret);
    identity.add_profile(ProfileRecord::from_principal(principal));
}

// ── Offline path ────────────────────────────────────────────────

#[tokio::test]
async fn offline_sign_in_with_seeded_admin() {
    let f = fixture(ConnectivityState::Degraded, SessionConfig::default());
    f.resolver.seed_account(admin(), "123456").unwrap();

    let principal = f.resolver.sign_in("admin@escola.com", "123456").await.unwrap();

    assert_eq!(principal.role, Role::Admin);
    assert_eq!(principal.email, "admin@escola.com");
    assert_eq!(f.resolver.current(), Some(principal.clone()));
    assert_eq!(f.resolver.state(), SessionState::Authenticated(principal));
}

#[tokio::test]
async fn offline_lookup_ignores_email_case() {
    let f = fixture(ConnectivityState::Degraded, SessionConfig::default());
    f.resolver.seed_account(admin(), "123456").unwrap();

    assert!(f.resolver.sign_in("  ADMIN@Escola.com ", "123456").await.is_ok());
}

#[tokio::test]
async fn offline_rejections_are_indistinguishable() {
    let f = fixture(ConnectivityState::Degraded, SessionConfig::default());
    f.resolver.seed_account(admin(), "123456").unwrap();
    f.resolver
        .seed_account(
            SessionPrincipal::new("Ex-funcionário", "old@escola.com", Role::Staff).with_active(false),
            "123456",
        )
        .unwrap();

    let unknown = f.resolver.sign_in("ghost@escola.com", "123456").await.unwrap_err();
    let wrong = f.resolver.sign_in("admin@escola.com", "654321").await.unwrap_err();
    let inactive = f.resolver.sign_in("old@escola.com", "123456").await.unwrap_err();

    for err in [&unknown, &wrong, &inactive] {
        assert!(matches!(err, SessionError::InvalidCredentials));
    }
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(wrong.to_string(), inactive.to_string());
    assert_eq!(f.resolver.state(), SessionState::Rejected);
    assert_eq!(f.resolver.current(), None);
}

#[tokio::test]
async fn offline_never_calls_identity_service() {
    let f = fixture(ConnectivityState::Degraded, SessionConfig::default());
    let principal = admin();
    register_remote(&f.identity, &principal, "123456");

    let err = f.resolver.sign_in("admin@escola.com", "123456").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidCredentials));
}

// ── Remote path ─────────────────────────────────────────────────

#[tokio::test]
async fn remote_sign_in_uses_profile() {
    let f = fixture(ConnectivityState::Connected, SessionConfig::default());
    let principal = admin().with_phone("+55 11 99999-0000");
    register_remote(&f.identity, &principal, "123456");

    let signed_in = f.resolver.sign_in("admin@escola.com", "123456").await.unwrap();

    assert_eq!(*signed_in, principal);
    assert!(f.resolver.state().is_authenticated());
}

#[tokio::test]
async fn remote_rejections_are_uniform() {
    let f = fixture(ConnectivityState::Connected, SessionConfig::default());
    register_remote(&f.identity, &admin(), "123456");

    let wrong = f.resolver.sign_in("admin@escola.com", "nope").await.unwrap_err();
    let unknown = f.resolver.sign_in("ghost@escola.com", "123456").await.unwrap_err();
    f.identity.set_available(false);
    let down = f.resolver.sign_in("admin@escola.com", "123456").await.unwrap_err();

    assert_eq!(wrong.to_string(), unknown.to_string());
    assert_eq!(unknown.to_string(), down.to_string());
    assert!(matches!(down, SessionError::InvalidCredentials));
}

#[tokio::test]
async fn remote_inactive_profile_is_rejected() {
    let f = fixture(ConnectivityState::Connected, SessionConfig::default());
    register_remote(&f.identity, &admin().with_active(false), "123456");

    assert!(f.resolver.sign_in("admin@escola.com", "123456").await.is_err());
}

#[tokio::test]
async fn missing_profile_falls_back_to_local_account() {
    let f = fixture(ConnectivityState::Connected, SessionConfig::default());
    let local = SessionPrincipal::new("Secretaria", "staff@escola.com", Role::Staff);
    f.identity.add_user("staff@escola.com", "remote-secret");
    f.resolver.seed_account(local.clone(), "other-secret").unwrap();

    let signed_in = f.resolver.sign_in("staff@escola.com", "remote-secret").await.unwrap();
    assert_eq!(*signed_in, local);
}

#[tokio::test]
async fn failed_profile_lookup_falls_back_to_local_account() {
    let f = fixture(ConnectivityState::Connected, SessionConfig::default());
    let principal = admin();
    register_remote(&f.identity, &principal, "123456");
    f.resolver.seed_account(principal.clone(), "123456").unwrap();
    f.identity.set_profiles_available(false);

    let signed_in = f.resolver.sign_in("admin@escola.com", "123456").await.unwrap();
    assert_eq!(signed_in.id, principal.id);
}

#[tokio::test]
async fn missing_profile_without_local_account_is_rejected() {
    let f = fixture(ConnectivityState::Connected, SessionConfig::default());
    f.identity.add_user("guardian@escola.com", "pw");

    let err = f.resolver.sign_in("guardian@escola.com", "pw").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidCredentials));
}

#[tokio::test]
async fn remember_offline_enables_degraded_sign_in() {
    let f = fixture(
        ConnectivityState::Connected,
        SessionConfig {
            remember_offline: true,
        },
    );
    let principal = admin();
    register_remote(&f.identity, &principal, "123456");

    f.resolver.sign_in("admin@escola.com", "123456").await.unwrap();
    let stored = f.accounts.find_account("admin@escola.com").unwrap();
    assert!(stored.verify_secret("123456"));
    assert_ne!(stored.verifier(), "123456");

    f.connectivity.send_replace(ConnectivityState::Degraded);
    let offline = f.resolver.sign_in("admin@escola.com", "123456").await.unwrap();
    assert_eq!(offline.id, principal.id);
}

#[tokio::test]
async fn remote_sign_in_is_not_remembered_by_default() {
    let f = fixture(ConnectivityState::Connected, SessionConfig::default());
    register_remote(&f.identity, &admin(), "123456");

    f.resolver.sign_in("admin@escola.com", "123456").await.unwrap();
    assert!(f.accounts.find_account("admin@escola.com").is_none());
}

// ── sign_out ────────────────────────────────────────────────────

#[tokio::test]
async fn sign_out_closes_remote_session() {
    let f = fixture(ConnectivityState::Connected, SessionConfig::default());
    register_remote(&f.identity, &admin(), "123456");
    f.resolver.sign_in("admin@escola.com", "123456").await.unwrap();

    f.resolver.sign_out().await;

    assert_eq!(f.identity.sign_out_count(), 1);
    assert_eq!(f.resolver.state(), SessionState::Unauthenticated);
    assert_eq!(f.resolver.current(), None);
}

#[tokio::test]
async fn sign_out_offline_session_is_local_only() {
    let f = fixture(ConnectivityState::Degraded, SessionConfig::default());
    f.resolver.seed_account(admin(), "123456").unwrap();
    f.resolver.sign_in("admin@escola.com", "123456").await.unwrap();

    f.resolver.sign_out().await;
    f.resolver.sign_out().await;

    assert_eq!(f.identity.sign_out_count(), 0);
    assert_eq!(f.resolver.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn sign_out_tolerates_lost_connectivity() {
    let f = fixture(ConnectivityState::Connected, SessionConfig::default());
    register_remote(&f.identity, &admin(), "123456");
    f.resolver.sign_in("admin@escola.com", "123456").await.unwrap();

    f.connectivity.send_replace(ConnectivityState::Degraded);
    f.resolver.sign_out().await;

    assert_eq!(f.identity.sign_out_count(), 0);
    assert_eq!(f.resolver.current(), None);
}

// ── Coordinator integration ─────────────────────────────────────

#[tokio::test]
async fn follows_coordinator_connectivity() {
    let store = Arc::new(MemoryConfigStore::new());
    store.set_available(false);
    let mirror = Arc::new(MemoryMirror::new());
    let coordinator = SyncCoordinator::new(store.clone(), mirror.clone(), SyncConfig::default());
    coordinator.start().await;

    let identity = Arc::new(MemoryIdentityService::new());
    let resolver = SessionResolver::new(
        identity.clone(),
        mirror.clone(),
        coordinator.watch_connectivity(),
        SessionConfig::default(),
    );

    let seeded = admin();
    resolver.seed_account(seeded.clone(), "123456").unwrap();
    let principal = resolver.sign_in("admin@escola.com", "123456").await.unwrap();
    assert_eq!(principal.role, Role::Admin);

    store.set_available(true);
    coordinator.set("theme", serde_json::json!({})).await.unwrap();
    assert_eq!(coordinator.connectivity(), ConnectivityState::Connected);

    // Now connected, and the identity service does not know this user.
    assert!(resolver.sign_in("admin@escola.com", "123456").await.is_err());
}
