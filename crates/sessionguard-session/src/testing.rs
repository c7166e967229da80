//! Test doubles for the collaborator traits.
//!
//! Used by this crate's unit tests and by the integration tests of the
//! crates above it. Each double records what was asked of it so tests can
//! assert on call counts and notices.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sessionguard_protocol::{
    AuthBackend, BackendError, Clock, Credentials, Navigator, NoticeKind, Notifier, Session,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// FixedClock
// ---------------------------------------------------------------------------

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// MockBackend
// ---------------------------------------------------------------------------

/// Lifetime of sessions issued by [`MockBackend`].
pub const MOCK_SESSION_LIFETIME_SECS: i64 = 3_600;

#[derive(Default)]
struct Script {
    session: Option<Session>,
    current_error: Option<BackendError>,
    refresh_error: Option<BackendError>,
    sign_in_error: Option<BackendError>,
    /// Sign-in fails this many more times before `sign_in_error` applies.
    sign_in_failures_left: u32,
    sign_in_delay: Duration,
    issued: u32,
}

/// Scriptable in-memory [`AuthBackend`].
///
/// Refresh and sign-in succeed by default, issuing a session valid for
/// [`MOCK_SESSION_LIFETIME_SECS`] from the mock's own clock.
pub struct MockBackend {
    clock: FixedClock,
    script: Mutex<Script>,
    current_calls: AtomicU32,
    refresh_calls: AtomicU32,
    sign_in_calls: AtomicU32,
    sign_out_calls: AtomicU32,
}

impl MockBackend {
    pub fn new(now: i64) -> Self {
        Self {
            clock: FixedClock::new(now),
            script: Mutex::new(Script::default()),
            current_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            sign_in_calls: AtomicU32::new(0),
            sign_out_calls: AtomicU32::new(0),
        }
    }

    /// The clock used to stamp issued sessions.
    pub fn clock(&self) -> &FixedClock {
        &self.clock
    }

    pub fn set_session(&self, session: Option<Session>) {
        lock(&self.script).session = session;
    }

    /// Installs a session expiring `secs` from the mock's clock.
    pub fn set_session_expiring_in(&self, secs: i64) {
        let expires_at = self.clock.now_epoch_secs() + secs;
        self.set_session(Some(Session::new("access-0", "refresh-0", expires_at)));
    }

    pub fn session(&self) -> Option<Session> {
        lock(&self.script).session.clone()
    }

    pub fn fail_current_session(&self, error: BackendError) {
        lock(&self.script).current_error = Some(error);
    }

    pub fn fail_refresh(&self, error: BackendError) {
        lock(&self.script).refresh_error = Some(error);
    }

    /// Every sign-in fails with `error` until [`Self::heal_sign_in`].
    pub fn fail_sign_in(&self, error: BackendError) {
        lock(&self.script).sign_in_error = Some(error);
    }

    /// The next `times` sign-ins fail, then they succeed again.
    pub fn fail_sign_in_times(&self, times: u32) {
        lock(&self.script).sign_in_failures_left = times;
    }

    pub fn heal_sign_in(&self) {
        let mut script = lock(&self.script);
        script.sign_in_error = None;
        script.sign_in_failures_left = 0;
    }

    /// Each sign-in suspends this long before answering.
    pub fn set_sign_in_delay(&self, delay: Duration) {
        lock(&self.script).sign_in_delay = delay;
    }

    pub fn current_calls(&self) -> u32 {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_in_calls(&self) -> u32 {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> u32 {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn issue(&self, script: &mut Script) -> Session {
        script.issued += 1;
        let n = script.issued;
        let session = Session::new(
            format!("access-{n}"),
            format!("refresh-{n}"),
            self.clock.now_epoch_secs() + MOCK_SESSION_LIFETIME_SECS,
        );
        script.session = Some(session.clone());
        session
    }
}

impl AuthBackend for MockBackend {
    async fn current_session(&self) -> Result<Option<Session>, BackendError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let script = lock(&self.script);
        match &script.current_error {
            Some(e) => Err(e.clone()),
            None => Ok(script.session.clone()),
        }
    }

    async fn refresh_session(&self) -> Result<Option<Session>, BackendError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = lock(&self.script);
        if let Some(e) = &script.refresh_error {
            return Err(e.clone());
        }
        if script.session.is_none() {
            return Ok(None);
        }
        Ok(Some(self.issue(&mut script)))
    }

    async fn sign_in_with_password(
        &self,
        _credentials: &Credentials,
    ) -> Result<Option<Session>, BackendError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let delay = lock(&self.script).sign_in_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = lock(&self.script);
        if script.sign_in_failures_left > 0 {
            script.sign_in_failures_left -= 1;
            return Err(BackendError::Unreachable("scripted failure".into()));
        }
        if let Some(e) = &script.sign_in_error {
            return Err(e.clone());
        }
        Ok(Some(self.issue(&mut script)))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.script).session = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier / RecordingNavigator
// ---------------------------------------------------------------------------

/// One notice as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

/// Keeps every notice in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn titles(&self) -> Vec<String> {
        lock(&self.notices).iter().map(|n| n.title.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.notices).is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NoticeKind, title: &str, message: &str) {
        lock(&self.notices).push(Notice {
            kind,
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}

/// Counts redirects and reloads.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: AtomicU32,
    reloads: AtomicU32,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> u32 {
        self.redirects.load(Ordering::SeqCst)
    }

    pub fn reloads(&self) -> u32 {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}
