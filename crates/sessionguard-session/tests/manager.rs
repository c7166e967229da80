//! End-to-end scenarios for the session manager against the mock backend.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use sessionguard_protocol::{BackendError, NoticeKind};
use sessionguard_retry::{CancelSignal, RetryError, RetryPolicy};
use sessionguard_session::testing::{FixedClock, MockBackend, RecordingNavigator, RecordingNotifier};
use sessionguard_session::{CallError, SessionConfig, SessionManager, SessionRecovery, notices};
use sessionguard_storage::{MemoryStore, StorageLayers};

const NOW: i64 = 1_700_000_000;

struct Client {
    backend: Arc<MockBackend>,
    notifier: Arc<RecordingNotifier>,
    navigator: Arc<RecordingNavigator>,
    volatile: Arc<MemoryStore>,
    persistent: Arc<MemoryStore>,
    manager: Arc<SessionManager<MockBackend>>,
}

fn client_with(config: SessionConfig) -> Client {
    let backend = Arc::new(MockBackend::new(NOW));
    let notifier = Arc::new(RecordingNotifier::new());
    let navigator = Arc::new(RecordingNavigator::new());
    let volatile = Arc::new(MemoryStore::with_entries([
        ("sessionguard.is_admin", "true"),
        ("wizard-step", "3"),
    ]));
    let persistent = Arc::new(MemoryStore::with_entries([
        ("sb-xyz-auth-token", "{}"),
        ("recent-searches", "[]"),
    ]));
    let layers = StorageLayers::new()
        .volatile(volatile.clone())
        .persistent(persistent.clone());
    let manager = SessionManager::new(
        Arc::clone(&backend),
        layers,
        notifier.clone(),
        navigator.clone(),
        config,
    )
    .with_clock(Arc::new(FixedClock::new(NOW)));

    Client {
        backend,
        notifier,
        navigator,
        volatile,
        persistent,
        manager: Arc::new(manager),
    }
}

fn client() -> Client {
    client_with(SessionConfig::default())
}

// =========================================================================
// Pre-request gate
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_expiring_session_refreshes_silently_before_call() {
    let c = client();
    c.backend.set_session_expiring_in(120);
    c.manager.relogin().store_credentials("ops@example.com", "pw");

    assert!(c.manager.validate_before_api_call().await);

    assert_eq!(c.backend.refresh_calls(), 1);
    assert_eq!(c.backend.sign_in_calls(), 0);
    assert!(c.notifier.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_healthy_session_passes_gate_without_refresh() {
    let c = client();
    c.backend.set_session_expiring_in(3_600);

    assert!(c.manager.validate_before_api_call().await);
    assert_eq!(c.backend.refresh_calls(), 0);
}

// =========================================================================
// Session error handling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_expired_session_without_credentials_signs_out() {
    let c = client();
    c.backend.set_session_expiring_in(-60);

    let recovery = c.manager.handle_session_error("401 from api", true).await;

    assert_eq!(recovery, SessionRecovery::SignedOut);
    assert_eq!(c.backend.sign_in_calls(), 0);
    assert_eq!(c.backend.sign_out_calls(), 1);
    assert!(!c.persistent.contains("sb-xyz-auth-token"));
    assert!(c.persistent.contains("recent-searches"));
    assert!(!c.volatile.contains("sessionguard.is_admin"));
    assert!(c.volatile.contains("wizard-step"));
    assert_eq!(c.navigator.redirects(), 1);

    let notices = c.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Error);
    assert_eq!(notices[0].title, notices::EXPIRED_TITLE);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_session_errors_share_one_relogin() {
    let c = client();
    c.manager.relogin().store_credentials("ops@example.com", "pw");
    c.backend.set_sign_in_delay(Duration::from_millis(250));

    let recoveries = join_all((0..6).map(|_| c.manager.handle_session_error("401", true))).await;

    assert_eq!(recoveries, vec![SessionRecovery::Restored; 6]);
    assert_eq!(c.backend.sign_in_calls(), 1);
    assert_eq!(
        c.notifier.titles(),
        vec![notices::RESTORING_TITLE, notices::RESTORED_TITLE]
    );
}

// =========================================================================
// Periodic validation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_periodic_validation_is_throttled_within_interval() {
    let c = client();
    c.backend.set_session_expiring_in(3_600);

    assert!(c.manager.periodic_validation().await.is_some());
    tokio::time::sleep(Duration::from_secs(299)).await;
    assert!(c.manager.periodic_validation().await.is_none());

    assert_eq!(c.backend.current_calls(), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(c.manager.periodic_validation().await.is_some());
    assert_eq!(c.backend.current_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_validation_backend_error_signs_out() {
    let c = client();
    c.backend.fail_current_session(BackendError::Unreachable("offline".into()));

    let result = c.manager.periodic_validation().await.unwrap();

    assert!(result.should_sign_out());
    assert_eq!(c.backend.sign_out_calls(), 1);
    assert_eq!(c.navigator.redirects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_periodic_checks_each_interval_until_cancelled() {
    let c = client();
    c.backend.set_session_expiring_in(86_400);
    let (handle, signal) = CancelSignal::new();

    let task = {
        let manager = Arc::clone(&c.manager);
        tokio::spawn(async move { manager.run_periodic(signal).await })
    };

    // Ticks at 0, 300 and 600 seconds.
    tokio::time::sleep(Duration::from_secs(650)).await;
    handle.cancel();
    task.await.unwrap();

    assert_eq!(c.backend.current_calls(), 3);
}

// =========================================================================
// Guarded calls
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_guarded_call_without_session_never_runs_operation() {
    let c = client();
    let mut calls = 0;

    let outcome: Result<(), CallError<String>> = c
        .manager
        .guarded_call(|| {
            calls += 1;
            async { Ok(()) }
        })
        .await;

    assert_eq!(outcome, Err(CallError::SessionUnavailable));
    assert_eq!(calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_guarded_call_refresh_failure_recovers_through_relogin() {
    let c = client();
    c.backend.set_session_expiring_in(-1);
    c.backend.fail_refresh(BackendError::Rejected("refresh token revoked".into()));
    c.manager.relogin().store_credentials("ops@example.com", "pw");

    let outcome: Result<u32, CallError<String>> =
        c.manager.guarded_call(|| async { Ok(42) }).await;

    assert_eq!(outcome, Ok(42));
    assert_eq!(c.backend.refresh_calls(), 1);
    assert_eq!(c.backend.sign_in_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_guarded_call_retries_under_api_policy() {
    let mut config = SessionConfig::default();
    config.manager.api_policy = RetryPolicy {
        jitter: false,
        ..RetryPolicy::api_call()
    };
    let c = client_with(config);
    c.backend.set_session_expiring_in(3_600);
    let mut calls = 0;

    let started = tokio::time::Instant::now();
    let outcome: Result<(), CallError<String>> = c
        .manager
        .guarded_call(|| {
            calls += 1;
            async { Err("503".to_string()) }
        })
        .await;

    assert_eq!(
        outcome,
        Err(CallError::Failed(RetryError::Operation("503".to_string())))
    );
    assert_eq!(calls, 4);
    assert_eq!(started.elapsed(), Duration::from_millis(7_000));
}
