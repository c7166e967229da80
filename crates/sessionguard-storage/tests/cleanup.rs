//! Integration tests for `SessionCleanup` and its three profiles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use sessionguard_protocol::{AuthBackend, BackendError, Credentials, Navigator, Session};
use sessionguard_storage::{
    CleanupConfig, CleanupOptions, KeyRegistry, MemoryDatabases, MemoryStore, SessionCleanup,
    StorageLayers,
};

// =========================================================================
// Test doubles
// =========================================================================

#[derive(Default)]
struct SignOutBackend {
    sign_outs: AtomicU32,
    fail: AtomicBool,
}

impl AuthBackend for SignOutBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(None)
    }

    async fn refresh_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(None)
    }

    async fn sign_in_with_password(
        &self,
        _credentials: &Credentials,
    ) -> Result<Option<Session>, BackendError> {
        Ok(None)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(BackendError::Unreachable("offline".into()))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct CountingNavigator {
    reloads: AtomicU32,
}

impl Navigator for CountingNavigator {
    fn redirect_to_login(&self) {}

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// One client with session artifacts and UX state in every layer.
struct Client {
    backend: Arc<SignOutBackend>,
    navigator: Arc<CountingNavigator>,
    volatile: Arc<MemoryStore>,
    persistent: Arc<MemoryStore>,
    databases: Arc<MemoryDatabases>,
    cookies: Arc<MemoryStore>,
    cleanup: SessionCleanup<SignOutBackend>,
}

fn client() -> Client {
    let backend = Arc::new(SignOutBackend::default());
    let navigator = Arc::new(CountingNavigator::default());
    let volatile = Arc::new(MemoryStore::with_entries([
        ("sessionguard.role", "admin"),
        ("sb-proj-auth-token", "tok"),
        ("wizard-step", "3"),
    ]));
    let persistent = Arc::new(MemoryStore::with_entries([
        ("sb-proj-auth-token", "tok"),
        ("supabase.auth.expires_at", "1700000000"),
        ("sessionguard.is_admin", "true"),
        ("theme", "dark"),
    ]));
    let databases = Arc::new(MemoryDatabases::with_databases(["supabase-auth", "drafts"]));
    let cookies = Arc::new(MemoryStore::with_entries([
        ("sb-access_token", "tok"),
        ("locale", "en"),
    ]));

    let layers = StorageLayers::new()
        .volatile(volatile.clone())
        .persistent(persistent.clone())
        .structured(databases.clone())
        .cookies(cookies.clone());
    let cleanup = SessionCleanup::new(backend.clone(), layers, CleanupConfig::default())
        .with_navigator(navigator.clone());

    Client {
        backend,
        navigator,
        volatile,
        persistent,
        databases,
        cookies,
        cleanup,
    }
}

// =========================================================================
// Profiles
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_logout_cleanup_clears_key_stores_and_keeps_ux_state() {
    let c = client();

    let report = c.cleanup.logout_cleanup().await;

    assert!(report.signed_out);
    assert_eq!(c.backend.sign_outs.load(Ordering::SeqCst), 1);
    assert_eq!(c.volatile.keys(), vec!["wizard-step"]);
    assert_eq!(c.persistent.keys(), vec!["theme"]);
    // Databases and cookies are untouched by a routine logout.
    assert_eq!(c.databases.names(), vec!["drafts", "supabase-auth"]);
    assert!(c.cookies.contains("sb-access_token"));
    assert_eq!(report.removed, 5);
    assert_eq!(report.failed, 0);
    assert!(!report.reloaded);
    assert_eq!(c.navigator.reloads.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_emergency_cleanup_clears_everything_and_reloads() {
    let c = client();

    let report = c.cleanup.emergency_cleanup().await;

    assert_eq!(c.volatile.keys(), vec!["wizard-step"]);
    assert_eq!(c.persistent.keys(), vec!["theme"]);
    assert_eq!(c.databases.names(), vec!["drafts"]);
    assert_eq!(c.cookies.keys(), vec!["locale"]);
    assert_eq!(report.removed, 6);
    assert_eq!(report.databases_deleted, 1);
    assert!(report.reloaded);
    assert_eq!(c.navigator.reloads.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_cleanup_touches_only_persistent_store() {
    let c = client();

    let report = c.cleanup.refresh_failure_cleanup().await;

    assert_eq!(c.persistent.keys(), vec!["theme"]);
    assert_eq!(c.volatile.len(), 3);
    assert_eq!(c.cookies.len(), 2);
    assert_eq!(c.databases.names().len(), 2);
    assert_eq!(report.removed, 3);
}

// =========================================================================
// Failure tolerance
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cleanup_failed_removal_does_not_abort_sweep() {
    let c = client();
    c.persistent.fail_removal_of("sb-proj-auth-token");
    c.databases.fail_deletion_of("supabase-auth");

    let report = c.cleanup.emergency_cleanup().await;

    assert_eq!(report.failed, 2);
    assert_eq!(c.persistent.keys(), vec!["sb-proj-auth-token", "theme"]);
    // Later layers are still swept.
    assert_eq!(c.cookies.keys(), vec!["locale"]);
    assert!(report.reloaded);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_sign_out_failure_still_sweeps_storage() {
    let c = client();
    c.backend.fail.store(true, Ordering::SeqCst);

    let report = c.cleanup.logout_cleanup().await;

    assert!(!report.signed_out);
    assert_eq!(c.persistent.keys(), vec!["theme"]);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_missing_layers_are_skipped() {
    let backend = Arc::new(SignOutBackend::default());
    let cleanup = SessionCleanup::new(backend.clone(), StorageLayers::new(), CleanupConfig::default());

    let report = cleanup.perform_cleanup(CleanupOptions::emergency()).await;

    assert!(report.signed_out);
    assert_eq!(report.removed, 0);
    // No navigator configured: reload is requested but cannot happen.
    assert!(!report.reloaded);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_custom_registry_decides_ownership() {
    let backend = Arc::new(SignOutBackend::default());
    let store = Arc::new(MemoryStore::with_entries([
        ("sb-proj-auth-token", "tok"),
        ("acme:session", "s"),
    ]));
    let config = CleanupConfig {
        registry: KeyRegistry::empty().with_prefix("acme:"),
        ..CleanupConfig::default()
    };
    let cleanup = SessionCleanup::new(
        backend,
        StorageLayers::new().persistent(store.clone()),
        config,
    );

    cleanup.logout_cleanup().await;

    assert_eq!(store.keys(), vec!["sb-proj-auth-token"]);
}

// =========================================================================
// Authorization flags
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_clear_authorization_flags_removes_only_flags() {
    let c = client();

    let report = c.cleanup.clear_authorization_flags();

    assert_eq!(report.removed, 2);
    assert!(!c.volatile.contains("sessionguard.role"));
    assert!(!c.persistent.contains("sessionguard.is_admin"));
    assert!(c.persistent.contains("sb-proj-auth-token"));
    assert_eq!(c.backend.sign_outs.load(Ordering::SeqCst), 0);
}
