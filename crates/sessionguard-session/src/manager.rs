//! The session manager: the one object the rest of the client talks to.
//!
//! It composes the validator, the re-login coordinator and the cleanup
//! layer into the calls an application actually makes:
//!
//! - before every authenticated request ([`SessionManager::validate_before_api_call`],
//!   [`SessionManager::guarded_call`])
//! - when a request comes back with an auth error
//!   ([`SessionManager::handle_session_error`])
//! - on a timer ([`SessionManager::periodic_validation`],
//!   [`SessionManager::run_periodic`])
//! - on explicit login and logout
//!
//! ## Escalation
//!
//! ```text
//! validate ──→ healthy ───────────────────────────────→ go ahead
//!    │
//!    ├──→ expiring/expired ──→ one refresh ──→ ok ────→ go ahead
//!    │                              │
//!    │                            fails (silent)
//!    │                              ▼
//!    └──→ discard ──────────→ handle_session_error
//!                                   │
//!                     credentials? ─┼─→ re-login ok ──→ Restored
//!                                   ▼
//!                        cleanup, notice, redirect ──→ SignedOut
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sessionguard_protocol::{
    AuthBackend, BackendError, Clock, Credentials, Navigator, NoticeKind, Notifier, Session,
    ValidationResult,
};
use sessionguard_retry::{CancelSignal, RetryControl, retry_with};
use sessionguard_storage::{CleanupReport, SessionCleanup, StorageLayers};
use tokio::time::{Instant, MissedTickBehavior};

use crate::{
    CallError, ManagerConfig, ReloginCoordinator, ReloginError, SessionConfig, SessionError,
    SessionValidator, notices,
};

/// How [`SessionManager::handle_session_error`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRecovery {
    /// Automatic re-login produced a new session.
    Restored,
    /// The session is gone and local state was purged.
    SignedOut,
}

/// Result of the pre-request gate, before it is flattened to a `bool`.
enum Gate {
    Open,
    /// No session at all; nothing to recover.
    Closed,
    /// The refresh attempt failed. Re-login may still rescue the call.
    RefreshFailed(SessionError),
    /// The session was discarded and `handle_session_error` already ran.
    Discarded,
}

/// Orchestrates validation, refresh, re-login and cleanup for one client.
pub struct SessionManager<B: AuthBackend> {
    backend: Arc<B>,
    validator: SessionValidator<B>,
    relogin: Arc<ReloginCoordinator<B>>,
    cleanup: SessionCleanup<B>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    config: ManagerConfig,
    cancel: Option<CancelSignal>,
    /// When `periodic_validation` last reached the backend.
    last_check: Mutex<Option<Instant>>,
    /// Latest failed re-login cycle whose sign-out has been claimed.
    signed_out_cycle: Mutex<Option<u64>>,
}

impl<B: AuthBackend> SessionManager<B> {
    /// Wires up every component from one config.
    pub fn new(
        backend: Arc<B>,
        layers: StorageLayers,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        config: SessionConfig,
    ) -> Self {
        let config = config.validated();
        let validator = SessionValidator::new(Arc::clone(&backend), config.validator);
        let relogin = Arc::new(ReloginCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&notifier),
            config.relogin,
        ));
        let cleanup = SessionCleanup::new(Arc::clone(&backend), layers, config.cleanup)
            .with_navigator(Arc::clone(&navigator));

        Self {
            backend,
            validator,
            relogin,
            cleanup,
            notifier,
            navigator,
            config: config.manager,
            cancel: None,
            last_check: Mutex::new(None),
            signed_out_cycle: Mutex::new(None),
        }
    }

    /// Replaces the wall clock used for expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let config = self.validator.config().clone();
        self.validator = SessionValidator::with_clock(Arc::clone(&self.backend), config, clock);
        self
    }

    /// Re-login runs and guarded calls stop when `signal` fires.
    pub fn with_cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn validator(&self) -> &SessionValidator<B> {
        &self.validator
    }

    pub fn relogin(&self) -> &Arc<ReloginCoordinator<B>> {
        &self.relogin
    }

    pub fn cleanup(&self) -> &SessionCleanup<B> {
        &self.cleanup
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn last_check(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_check.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn relogin_control(&self) -> RetryControl {
        let control = match self.config.relogin_timeout() {
            Some(timeout) => RetryControl::with_timeout(timeout),
            None => RetryControl::default(),
        };
        match &self.cancel {
            Some(signal) => control.cancel_on(signal.clone()),
            None => control,
        }
    }

    // -----------------------------------------------------------------------
    // Validation and refresh
    // -----------------------------------------------------------------------

    pub async fn validate_session(&self) -> ValidationResult {
        self.validator.validate().await
    }

    /// Refresh if needed, one attempt. Failures are logged, not shown.
    pub async fn attempt_refresh(&self) -> bool {
        match self.validator.refresh_session_if_needed().await {
            Ok(usable) => usable,
            Err(e) => {
                tracing::debug!(error = %e, "refresh attempt failed");
                false
            }
        }
    }

    /// Throttled validation for timers.
    ///
    /// Returns `None` without touching the backend if the previous check
    /// is less than `check_interval` old. A result that must be discarded
    /// is handed to [`Self::handle_session_error`].
    pub async fn periodic_validation(&self) -> Option<ValidationResult> {
        {
            let mut last_check = self.last_check();
            let now = Instant::now();
            if let Some(previous) = *last_check {
                if now.duration_since(previous) < self.config.check_interval() {
                    tracing::trace!("periodic validation throttled");
                    return None;
                }
            }
            *last_check = Some(now);
        }

        let result = self.validate_session().await;
        if result.should_sign_out() {
            let reason = result.error().unwrap_or("session validation failed");
            self.handle_session_error(reason, true).await;
        }
        Some(result)
    }

    /// Calls [`Self::periodic_validation`] every `check_interval` until
    /// `cancel` fires.
    pub async fn run_periodic(&self, cancel: CancelSignal) {
        let mut ticker = tokio::time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval = ?self.config.check_interval(), "periodic validation started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("periodic validation stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.periodic_validation().await;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Request gating
    // -----------------------------------------------------------------------

    async fn gate(&self) -> Gate {
        let result = self.validate_session().await;

        if result.should_sign_out() {
            let reason = result.error().unwrap_or("session validation failed");
            self.handle_session_error(reason, true).await;
            return Gate::Discarded;
        }
        if !result.needs_refresh() {
            return if result.is_valid() { Gate::Open } else { Gate::Closed };
        }

        match self.validator.refresh().await {
            Ok(_) => Gate::Open,
            Err(e) => {
                tracing::debug!(error = %e, "refresh before api call failed");
                Gate::RefreshFailed(e)
            }
        }
    }

    /// `true` if an authenticated request may be sent right now.
    ///
    /// A session that must be discarded is handled here. A failed refresh
    /// is not: it only returns `false`, and escalating to re-login is up
    /// to the caller (see [`Self::guarded_call`]).
    pub async fn validate_before_api_call(&self) -> bool {
        matches!(self.gate().await, Gate::Open)
    }

    /// Gate, then run `operation` under the api-call retry policy.
    ///
    /// If the gate's refresh failed, the session error is handled first;
    /// the call goes ahead only if that restored the session.
    pub async fn guarded_call<T, E, F, Fut>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        match self.gate().await {
            Gate::Open => {}
            Gate::Closed | Gate::Discarded => return Err(CallError::SessionUnavailable),
            Gate::RefreshFailed(e) => {
                if self.handle_session_error(&e, true).await != SessionRecovery::Restored {
                    return Err(CallError::SessionUnavailable);
                }
            }
        }

        let control = RetryControl {
            deadline: None,
            cancel: self.cancel.clone(),
        };
        retry_with(operation, &self.config.api_policy, &control)
            .await
            .into_result()
            .map_err(CallError::Failed)
    }

    // -----------------------------------------------------------------------
    // Recovery and sign-out
    // -----------------------------------------------------------------------

    /// Recover from an auth failure, or sign out.
    ///
    /// With cached credentials, re-login is tried first. Otherwise, or if
    /// it fails, local state is purged. The "session expired" notice is
    /// shown only when no re-login was attempted; a failed re-login has
    /// already told the user to log in again.
    ///
    /// Callers that shared one failed re-login sign out once: the first
    /// one through purges and redirects, the rest only return
    /// [`SessionRecovery::SignedOut`].
    pub async fn handle_session_error(
        &self,
        error: impl fmt::Display,
        redirect_to_login: bool,
    ) -> SessionRecovery {
        tracing::info!(%error, redirect_to_login, "handling session error");

        let (cycle, outcome) = self.relogin.relogin_cycle(true, &self.relogin_control()).await;
        let relogin_attempted = match outcome {
            Ok(report) => {
                tracing::info!(attempts = report.attempts, "session restored");
                return SessionRecovery::Restored;
            }
            Err(ReloginError::NoCredentials) => false,
            Err(e) => {
                tracing::debug!(error = %e, "re-login did not restore the session");
                true
            }
        };

        if let Some(cycle) = cycle {
            let mut claimed = self
                .signed_out_cycle
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *claimed == Some(cycle) {
                tracing::debug!(cycle, "sign-out for this re-login already handled");
                return SessionRecovery::SignedOut;
            }
            *claimed = Some(cycle);
        }

        self.clear_session().await;
        if !relogin_attempted {
            self.notifier.notify(
                NoticeKind::Error,
                notices::EXPIRED_TITLE,
                notices::EXPIRED_MESSAGE,
            );
        }
        if redirect_to_login {
            self.cleanup.clear_authorization_flags();
            self.navigator.redirect_to_login();
        }
        SessionRecovery::SignedOut
    }

    /// Signs out and purges the logout profile.
    pub async fn clear_session(&self) -> CleanupReport {
        self.cleanup.logout_cleanup().await
    }

    /// Manual login. With `remember`, the credentials are cached for
    /// automatic re-login; without it, any previously cached ones are
    /// dropped.
    pub async fn sign_in(
        &self,
        credentials: Credentials,
        remember: bool,
    ) -> Result<Session, SessionError> {
        tracing::info!(identifier = %credentials.identifier, remember, "signing in");
        let session = match self.backend.sign_in_with_password(&credentials).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(SessionError::SignIn(BackendError::NoSession)),
            Err(e) => {
                tracing::warn!(error = %e, "sign-in failed");
                return Err(SessionError::SignIn(e));
            }
        };

        if remember {
            let secret = credentials.secret().to_string();
            self.relogin.store_credentials(credentials.identifier, secret);
        } else {
            self.relogin.clear_credentials();
        }
        *self.last_check() = None;
        Ok(session)
    }

    /// User-initiated logout: forget credentials, purge, redirect.
    pub async fn sign_out(&self) -> CleanupReport {
        tracing::info!("signing out");
        self.relogin.clear_credentials();
        let mut report = self.clear_session().await;
        let flags = self.cleanup.clear_authorization_flags();
        report.removed += flags.removed;
        report.failed += flags.failed;
        *self.last_check() = None;
        self.navigator.redirect_to_login();
        report
    }
}
