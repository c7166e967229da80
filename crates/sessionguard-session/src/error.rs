//! Error types for the session layer.
//!
//! Four failure classes exist, and each is handled differently:
//!
//! - validation failures force a sign-out and are shown to the user;
//! - a failed single-shot refresh is silent and escalates to re-login;
//! - an exhausted re-login is shown to the user and forgets credentials;
//! - storage cleanup failures are logged and swallowed (they never leave
//!   `sessionguard-storage`).

use sessionguard_protocol::BackendError;
use sessionguard_retry::RetryError;

/// Errors from the validator and the manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The backend could not tell us what the current session is.
    #[error("session validation failed: {0}")]
    Validation(BackendError),

    /// The single refresh attempt failed.
    #[error("session refresh failed: {0}")]
    RefreshFailed(BackendError),

    /// Automatic re-login did not restore the session.
    #[error(transparent)]
    Relogin(#[from] ReloginError),

    /// Manual sign-in was refused.
    #[error("sign-in failed: {0}")]
    SignIn(BackendError),

    /// There is no usable session and none could be obtained.
    #[error("no usable session")]
    SessionUnavailable,
}

/// Why an automatic re-login did not restore the session.
///
/// `Clone` because one outcome is handed to every concurrent waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReloginError {
    /// Nothing was cached, so nothing was attempted.
    #[error("no stored credentials for automatic re-login")]
    NoCredentials,

    /// Every sign-in attempt failed. `cause` is the last error.
    ///
    /// A wrong password and an unreachable backend both end up here.
    #[error("automatic re-login failed after {attempts} attempt(s): {cause}")]
    Exhausted { attempts: u32, cause: BackendError },

    /// The run's deadline passed before an attempt succeeded.
    #[error("automatic re-login timed out after {attempts} attempt(s)")]
    TimedOut { attempts: u32 },

    /// The run was cancelled from outside.
    #[error("automatic re-login cancelled")]
    Cancelled,

    /// The task driving the attempt went away before finishing.
    #[error("automatic re-login abandoned before completion")]
    Abandoned,
}

/// Errors from [`SessionManager::guarded_call`](crate::SessionManager::guarded_call).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError<E> {
    /// The session gate stayed closed; the call was never made.
    #[error("no usable session")]
    SessionUnavailable,

    /// The call itself failed after retrying.
    #[error("api call failed: {0}")]
    Failed(RetryError<E>),
}
