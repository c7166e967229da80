//! Session classification and single-shot refresh.
//!
//! The validator answers one question: "can the current session be used,
//! and does it need refreshing?" It reads the session from the backend,
//! compares the expiry with the clock, and classifies it:
//!
//! ```text
//!          get current session
//!                  │
//!        ┌─────────┼──────────────┐
//!      error     none           some
//!        │         │              │
//!  BackendError NoSession   expires_at <= now ──────────→ Expired
//!                           expires_at <= now + window ─→ ExpiringSoon
//!                           otherwise ──────────────────→ Healthy
//! ```
//!
//! Refresh here is exactly one backend call. Retrying and escalating to
//! re-login belong to the manager.

use std::sync::Arc;
use std::time::Duration;

use sessionguard_protocol::{
    AuthBackend, BackendError, Clock, Session, SessionStatus, SystemClock, ValidationResult,
};

use crate::{SessionError, ValidatorConfig};

/// Classifies a session snapshot taken at `now` (epoch seconds).
///
/// Pure: same inputs, same answer. A session with an empty access token
/// is treated as malformed, which forces a sign-out.
pub fn classify(session: Option<&Session>, now: i64, refresh_window: Duration) -> ValidationResult {
    let Some(session) = session else {
        return ValidationResult::new(SessionStatus::NoSession);
    };

    if session.access_token.is_empty() {
        let err = BackendError::Malformed("empty access token".into());
        return ValidationResult::new(SessionStatus::BackendError(err.to_string()));
    }

    let window = i64::try_from(refresh_window.as_secs()).unwrap_or(i64::MAX);
    let status = if session.is_expired(now) {
        SessionStatus::Expired
    } else if session.expires_within(now, window) {
        SessionStatus::ExpiringSoon
    } else {
        SessionStatus::Healthy
    };
    ValidationResult::new(status)
}

/// Reads and classifies the backend's current session.
pub struct SessionValidator<B: AuthBackend> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    config: ValidatorConfig,
}

impl<B: AuthBackend> SessionValidator<B> {
    /// A validator using the system clock.
    pub fn new(backend: Arc<B>, config: ValidatorConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: Arc<B>, config: ValidatorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Classify the current session. The only side effect is the backend
    /// read.
    pub async fn validate(&self) -> ValidationResult {
        let result = match self.backend.current_session().await {
            Ok(session) => classify(
                session.as_ref(),
                self.clock.now_epoch_secs(),
                self.config.refresh_window(),
            ),
            Err(e) => ValidationResult::new(SessionStatus::BackendError(e.to_string())),
        };

        tracing::debug!(status = %result.status(), "session classified");
        result
    }

    /// Refresh if the current session is expired or about to be.
    ///
    /// Returns:
    /// - `Ok(true)` if the session was fine or a refresh produced a new one
    /// - `Ok(false)` if there is no session, or it must be discarded
    /// - `Err(SessionError::RefreshFailed)` if the one refresh call failed
    pub async fn refresh_session_if_needed(&self) -> Result<bool, SessionError> {
        let result = self.validate().await;
        if !result.needs_refresh() {
            return Ok(result.is_valid());
        }
        self.refresh().await.map(|_| true)
    }

    /// One refresh call, no retry.
    pub async fn refresh(&self) -> Result<Session, SessionError> {
        tracing::info!("refreshing session");
        match self.backend.refresh_session().await {
            Ok(Some(session)) => {
                tracing::debug!(
                    expires_in = session.seconds_until_expiry(self.clock.now_epoch_secs()),
                    "session refreshed"
                );
                Ok(session)
            }
            Ok(None) => {
                tracing::debug!("refresh returned no session");
                Err(SessionError::RefreshFailed(BackendError::NoSession))
            }
            Err(e) => {
                tracing::debug!(error = %e, "refresh failed");
                Err(SessionError::RefreshFailed(e))
            }
        }
    }
}
