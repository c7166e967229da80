//! Collaborator traits: the parts of the world the session core talks to
//! but does not implement.
//!
//! sessionguard doesn't speak any auth provider's wire format. Instead it
//! defines [`AuthBackend`], four async methods covering everything the
//! lifecycle needs, and you implement it on top of your provider's SDK or
//! HTTP API. The same goes for user-visible notices ([`Notifier`]) and
//! page-level navigation ([`Navigator`]).

use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{BackendError, Credentials, NoticeKind, Session};

// ---------------------------------------------------------------------------
// AuthBackend
// ---------------------------------------------------------------------------

/// The auth service that owns sessions.
///
/// # Trait bounds
///
/// - `Send + Sync` → one backend is shared by the validator, the
///   re-login coordinator and the cleanup layer, possibly across tasks.
/// - `'static` → it lives as long as the session context that owns it.
///
/// # Example
///
/// ```rust
/// use sessionguard_protocol::{AuthBackend, BackendError, Credentials, Session};
///
/// /// Hands out a fresh one-hour session for any password.
/// struct DevBackend;
///
/// impl AuthBackend for DevBackend {
///     async fn current_session(&self) -> Result<Option<Session>, BackendError> {
///         Ok(None)
///     }
///
///     async fn refresh_session(&self) -> Result<Option<Session>, BackendError> {
///         Err(BackendError::NoSession)
///     }
///
///     async fn sign_in_with_password(
///         &self,
///         _credentials: &Credentials,
///     ) -> Result<Option<Session>, BackendError> {
///         Ok(Some(Session::new("access", "refresh", i64::MAX)))
///     }
///
///     async fn sign_out(&self) -> Result<(), BackendError> {
///         Ok(())
///     }
/// }
/// ```
pub trait AuthBackend: Send + Sync + 'static {
    /// Returns the session the backend currently holds, if any.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Exchanges the current refresh token for a new session.
    ///
    /// `Ok(None)` means the call went through but produced nothing usable;
    /// the core treats that as a failed refresh.
    fn refresh_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Establishes a brand-new session from an identifier and password.
    fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Ends the session on the backend side.
    fn sign_out(&self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

// ---------------------------------------------------------------------------
// Notifier / Navigator
// ---------------------------------------------------------------------------

/// Shows short status messages to the user (toasts, banners, log lines).
///
/// Fire-and-forget: the core never waits on a notice and never learns
/// whether it was displayed. Implementations must not block.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, kind: NoticeKind, title: &str, message: &str);
}

/// Moves the client between surfaces.
pub trait Navigator: Send + Sync + 'static {
    /// Sends the user to the login surface.
    fn redirect_to_login(&self);

    /// Forces a full client reload, discarding all in-memory state.
    fn reload(&self);
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall-clock source used to compare against session expiry.
///
/// Session expiry is an absolute epoch timestamp chosen by the backend,
/// so this has to be wall-clock time, not a monotonic `Instant`.
pub trait Clock: Send + Sync + 'static {
    /// Seconds since the Unix epoch.
    fn now_epoch_secs(&self) -> i64;
}

/// The system's real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
            Err(e) => {
                tracing::warn!(error = %e, "system clock is before the Unix epoch");
                0
            }
        }
    }
}
