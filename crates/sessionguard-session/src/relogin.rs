//! Automatic re-login with cached credentials.
//!
//! When refresh fails, the session can still be rebuilt from scratch if
//! the user opted in to "remember this session": the coordinator keeps the
//! identifier and password in memory and signs in again on their behalf.
//!
//! # One attempt at a time
//!
//! A session usually dies for every in-flight request at once. Without
//! coordination, ten failing requests would mean ten parallel sign-ins.
//! The coordinator lets exactly one caller (the *leader*) run the sign-in;
//! everyone arriving while it runs becomes a *waiter* and receives the
//! leader's outcome:
//!
//! ```text
//!  caller A ──→ relogin() ──→ [leader] sign-in, backoff, sign-in ──┐
//!  caller B ──→ relogin() ──→ [waiter] ───────────────────────────┤──→ same outcome
//!  caller C ──→ relogin() ──→ [waiter] ───────────────────────────┘
//! ```
//!
//! The outcome travels over a `tokio::sync::watch` channel. Waiters grab a
//! receiver under the state lock, so none of them can miss it.
//!
//! Clearing the credentials (logout) aborts the running sign-in: the run
//! ends as [`ReloginError::Cancelled`] and no restored session is handed
//! out, even if the backend answered in the meantime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sessionguard_protocol::{AuthBackend, BackendError, Credentials, NoticeKind, Notifier, Session};
use sessionguard_retry::{CancelHandle, CancelSignal, RetryControl, RetryError, retry_with};
use tokio::sync::watch;

use crate::{ReloginConfig, ReloginError, notices};

/// A successful re-login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloginReport {
    /// Sign-in attempts the leader needed.
    pub attempts: u32,
    /// From the first sign-in attempt to the successful one.
    pub elapsed: Duration,
    /// The new session.
    pub session: Session,
}

type Outcome = Result<ReloginReport, ReloginError>;

type SuccessCallback = Box<dyn FnOnce(&ReloginReport) + Send>;
type FailureCallback = Box<dyn FnOnce(&ReloginError) + Send>;

// ---------------------------------------------------------------------------
// ReloginOptions
// ---------------------------------------------------------------------------

/// Per-call options for [`ReloginCoordinator::attempt_auto_relogin`].
pub struct ReloginOptions {
    /// Show "restoring" / "restored" / "log in again" notices. Only the
    /// leader shows them; waiters stay quiet.
    pub notify: bool,

    /// Deadline and cancel signal for the sign-in attempts.
    pub control: RetryControl,

    on_success: Option<SuccessCallback>,
    on_failure: Option<FailureCallback>,
}

impl Default for ReloginOptions {
    fn default() -> Self {
        Self {
            notify: true,
            control: RetryControl::default(),
            on_success: None,
            on_failure: None,
        }
    }
}

impl ReloginOptions {
    /// No user-visible notices.
    pub fn silent() -> Self {
        Self {
            notify: false,
            ..Self::default()
        }
    }

    /// Bounds the sign-in attempts with a deadline or cancel signal.
    pub fn with_control(mut self, control: RetryControl) -> Self {
        self.control = control;
        self
    }

    /// Called with the report once the session is restored. Waiters get
    /// their own call.
    pub fn on_success(mut self, f: impl FnOnce(&ReloginReport) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Called with the error when the re-login does not restore the
    /// session, including when nothing was cached.
    pub fn on_failure(mut self, f: impl FnOnce(&ReloginError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }
}

// ---------------------------------------------------------------------------
// ReloginCoordinator
// ---------------------------------------------------------------------------

#[derive(Default)]
struct State {
    credentials: Option<Credentials>,
    /// Re-login cycles started so far.
    cycles: u64,
    /// `Some` while a re-login is running.
    in_flight: Option<Run>,
}

/// The re-login currently running.
struct Run {
    cycle: u64,
    rx: watch::Receiver<Option<Outcome>>,
    /// Fired by `clear_credentials`.
    abort: CancelHandle,
}

enum Role {
    Leader {
        cycle: u64,
        tx: watch::Sender<Option<Outcome>>,
        abort: CancelHandle,
        aborted: CancelSignal,
        credentials: Credentials,
    },
    Waiter {
        cycle: u64,
        rx: watch::Receiver<Option<Outcome>>,
    },
}

/// Serializes automatic re-login attempts into one in-flight sign-in.
///
/// One coordinator per running client. It is shared by `Arc`; all of its
/// state is private and changed only through these methods.
pub struct ReloginCoordinator<B: AuthBackend> {
    backend: Arc<B>,
    notifier: Arc<dyn Notifier>,
    config: ReloginConfig,
    state: Mutex<State>,
}

impl<B: AuthBackend> ReloginCoordinator<B> {
    pub fn new(backend: Arc<B>, notifier: Arc<dyn Notifier>, config: ReloginConfig) -> Self {
        Self {
            backend,
            notifier,
            config,
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache credentials for later re-login. Replaces any previous ones.
    ///
    /// A re-login already running keeps using the credentials it started
    /// with.
    pub fn store_credentials(&self, identifier: impl Into<String>, secret: impl Into<String>) {
        self.lock().credentials = Some(Credentials::new(identifier, secret));
        tracing::debug!("credentials cached for automatic re-login");
    }

    /// Forget the cached credentials and abort any re-login using them.
    pub fn clear_credentials(&self) {
        let mut state = self.lock();
        if state.credentials.take().is_some() {
            tracing::debug!("cached credentials cleared");
        }
        if let Some(run) = &state.in_flight {
            tracing::info!(cycle = run.cycle, "aborting running re-login");
            run.abort.cancel();
        }
    }

    pub fn has_stored_credentials(&self) -> bool {
        self.lock().credentials.is_some()
    }

    /// `true` while a re-login is running.
    pub fn is_in_progress(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Re-login with the cached credentials, invoking the callbacks in
    /// `options`. Returns whether the session was restored.
    pub async fn attempt_auto_relogin(&self, mut options: ReloginOptions) -> bool {
        let outcome = self.relogin(options.notify, &options.control).await;
        match &outcome {
            Ok(report) => {
                if let Some(f) = options.on_success.take() {
                    f(report);
                }
                true
            }
            Err(e) => {
                if let Some(f) = options.on_failure.take() {
                    f(e);
                }
                false
            }
        }
    }

    /// Re-login with the cached credentials.
    ///
    /// If another call is already running, waits for it and returns its
    /// outcome instead of signing in again.
    pub async fn relogin(&self, notify: bool, control: &RetryControl) -> Result<ReloginReport, ReloginError> {
        self.relogin_cycle(notify, control).await.1
    }

    /// [`Self::relogin`], also naming the cycle whose outcome was
    /// returned. Callers sharing one cycle got the same outcome. `None`
    /// when nothing was attempted.
    pub(crate) async fn relogin_cycle(&self, notify: bool, control: &RetryControl) -> (Option<u64>, Outcome) {
        let role = {
            let mut state = self.lock();
            match &state.in_flight {
                Some(run) => Role::Waiter {
                    cycle: run.cycle,
                    rx: run.rx.clone(),
                },
                None => {
                    let Some(credentials) = state.credentials.clone() else {
                        tracing::debug!("automatic re-login skipped: no cached credentials");
                        return (None, Err(ReloginError::NoCredentials));
                    };
                    state.cycles += 1;
                    let cycle = state.cycles;
                    let (tx, rx) = watch::channel(None);
                    let (abort, aborted) = CancelSignal::new();
                    state.in_flight = Some(Run {
                        cycle,
                        rx,
                        abort: abort.clone(),
                    });
                    Role::Leader {
                        cycle,
                        tx,
                        abort,
                        aborted,
                        credentials,
                    }
                }
            }
        };

        match role {
            Role::Waiter { cycle, rx } => {
                tracing::debug!(cycle, "automatic re-login already running, waiting for it");
                (Some(cycle), wait_for_outcome(rx).await)
            }
            Role::Leader {
                cycle,
                tx,
                abort,
                aborted,
                credentials,
            } => {
                let flight = InFlight {
                    coordinator: self,
                    tx: Some(tx),
                    abort,
                };
                let outcome = tokio::select! {
                    biased;
                    _ = aborted.cancelled() => {
                        tracing::info!(cycle, "automatic re-login aborted: credentials cleared");
                        Err(ReloginError::Cancelled)
                    }
                    outcome = self.sign_in(&credentials, notify, control) => outcome,
                };
                (Some(cycle), flight.finish(outcome))
            }
        }
    }

    async fn sign_in(&self, credentials: &Credentials, notify: bool, control: &RetryControl) -> Outcome {
        tracing::info!(identifier = %credentials.identifier, "starting automatic re-login");
        if notify {
            self.notifier.notify(
                NoticeKind::Info,
                notices::RESTORING_TITLE,
                notices::RESTORING_MESSAGE,
            );
        }

        let backend = &self.backend;
        let result = retry_with(
            || async move {
                match backend.sign_in_with_password(credentials).await {
                    Ok(Some(session)) => Ok(session),
                    Ok(None) => Err(BackendError::NoSession),
                    Err(e) => Err(e),
                }
            },
            &self.config.policy,
            control,
        )
        .await;

        let attempts = result.attempts;
        let elapsed = result.elapsed;
        let outcome = match result.into_result() {
            Ok(session) => Ok(ReloginReport {
                attempts,
                elapsed,
                session,
            }),
            Err(RetryError::Operation(cause)) => Err(ReloginError::Exhausted { attempts, cause }),
            Err(RetryError::DeadlineExceeded) => Err(ReloginError::TimedOut { attempts }),
            Err(RetryError::Cancelled) => Err(ReloginError::Cancelled),
        };

        match &outcome {
            Ok(report) => {
                tracing::info!(attempts = report.attempts, "automatic re-login succeeded");
                if notify {
                    self.notifier.notify(
                        NoticeKind::Info,
                        notices::RESTORED_TITLE,
                        &notices::restored_message(report.attempts),
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "automatic re-login failed");
                if notify {
                    self.notifier.notify(
                        NoticeKind::Error,
                        notices::LOGIN_AGAIN_TITLE,
                        notices::LOGIN_AGAIN_MESSAGE,
                    );
                }
            }
        }

        outcome
    }

    /// Whether a failed outcome should cost us the cached credentials.
    ///
    /// Exhausted (and timed-out) runs forget them unless the config keeps
    /// them for transient failures. Cancelled and abandoned runs never
    /// forget them: the run was stopped from outside and says nothing
    /// about the password. A run cancelled by [`Self::clear_credentials`]
    /// has already lost them anyway.
    fn forgets_credentials(&self, error: &ReloginError) -> bool {
        match error {
            ReloginError::Exhausted { cause, .. } => {
                !(self.config.keep_credentials_on_transient_failure && cause.is_transient())
            }
            ReloginError::TimedOut { .. } => !self.config.keep_credentials_on_transient_failure,
            ReloginError::NoCredentials | ReloginError::Cancelled | ReloginError::Abandoned => false,
        }
    }
}

async fn wait_for_outcome(mut rx: watch::Receiver<Option<Outcome>>) -> Outcome {
    match rx.wait_for(Option::is_some).await {
        Ok(value) => value.clone().unwrap_or(Err(ReloginError::Abandoned)),
        Err(_) => Err(ReloginError::Abandoned),
    }
}

/// Leader-side handle on the running re-login.
///
/// Publishes the outcome and clears the in-flight marker exactly once:
/// from [`InFlight::finish`], or from `Drop` with
/// [`ReloginError::Abandoned`] if the leader's future was dropped first.
///
/// A success is downgraded to [`ReloginError::Cancelled`] if the run was
/// aborted after the backend answered but before publishing.
struct InFlight<'a, B: AuthBackend> {
    coordinator: &'a ReloginCoordinator<B>,
    tx: Option<watch::Sender<Option<Outcome>>>,
    abort: CancelHandle,
}

impl<B: AuthBackend> InFlight<'_, B> {
    fn finish(mut self, outcome: Outcome) -> Outcome {
        self.publish(outcome)
    }

    fn publish(&mut self, outcome: Outcome) -> Outcome {
        let Some(tx) = self.tx.take() else {
            return outcome;
        };
        let outcome = {
            let mut state = self.coordinator.lock();
            state.in_flight = None;
            let outcome = match outcome {
                Ok(_) if self.abort.is_cancelled() => Err(ReloginError::Cancelled),
                outcome => outcome,
            };
            if let Err(e) = &outcome {
                if self.coordinator.forgets_credentials(e) && state.credentials.take().is_some() {
                    tracing::info!("cached credentials cleared after failed re-login");
                }
            }
            outcome
        };
        tx.send_replace(Some(outcome.clone()));
        outcome
    }
}

impl<B: AuthBackend> Drop for InFlight<'_, B> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!("automatic re-login dropped before completion");
            let _ = self.publish(Err(ReloginError::Abandoned));
        }
    }
}
