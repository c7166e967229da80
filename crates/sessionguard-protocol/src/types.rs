//! Core data types shared by every sessionguard layer.
//!
//! A [`Session`] is always a snapshot: the auth backend owns the live
//! session and the core only ever reads what a backend call handed back.
//! When a refresh or re-login succeeds, the snapshot is replaced as a
//! whole; nothing here is mutated in place.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Proof of authentication issued by the auth backend.
///
/// Both tokens are opaque to the core. `expires_at` is an absolute
/// timestamp in seconds since the Unix epoch, which is what most token
/// services hand out (the JWT `exp` claim uses the same unit).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token attached to API requests.
    pub access_token: String,

    /// Token exchanged for a fresh session during refresh.
    pub refresh_token: String,

    /// Absolute expiry, epoch seconds.
    pub expires_at: i64,
}

impl Session {
    /// Creates a session snapshot.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Seconds left before expiry. Negative once the session has expired.
    pub fn seconds_until_expiry(&self, now: i64) -> i64 {
        self.expires_at.saturating_sub(now)
    }

    /// `true` once `now` has reached the expiry timestamp.
    ///
    /// The boundary is inclusive: a session whose `expires_at` equals
    /// `now` is already unusable.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// `true` when the session has not expired yet but will within
    /// `window_secs`.
    pub fn expires_within(&self, now: i64, window_secs: i64) -> bool {
        !self.is_expired(now) && self.expires_at <= now.saturating_add(window_secs)
    }
}

/// Tokens never reach logs. Only the expiry is printed.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Email and password kept in memory for automatic re-login.
///
/// Deliberately not `Serialize`: these must never be written anywhere.
/// The coordinator drops them on logout, after a failed re-login, and
/// implicitly when the process exits.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login identifier (an email address for password sign-in).
    pub identifier: String,

    secret: String,
}

impl Credentials {
    /// Pairs an identifier with its secret.
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    /// The password. Only backends should need this.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SessionStatus / ValidationResult
// ---------------------------------------------------------------------------

/// Classification of a session snapshot against the clock.
///
/// ```text
///   no session ─────────────────────────────→ NoSession
///   expires_at <= now ──────────────────────→ Expired
///   now < expires_at <= now + window ───────→ ExpiringSoon
///   expires_at > now + window ──────────────→ Healthy
///   backend lookup failed / malformed ──────→ BackendError
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// The backend reported no session at all.
    NoSession,

    /// The session is past its expiry and must be refreshed before use.
    Expired,

    /// Still usable, but inside the refresh window.
    ExpiringSoon,

    /// Usable with no action needed.
    Healthy,

    /// The lookup itself failed. The session cannot be trusted and the
    /// client should be signed out.
    BackendError(String),
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::NoSession => write!(f, "no-session"),
            SessionStatus::Expired => write!(f, "expired"),
            SessionStatus::ExpiringSoon => write!(f, "expiring-soon"),
            SessionStatus::Healthy => write!(f, "healthy"),
            SessionStatus::BackendError(_) => write!(f, "backend-error"),
        }
    }
}

/// Result of one validation pass.
///
/// The flags are derived from [`SessionStatus`] rather than stored, so
/// `should_sign_out` and `needs_refresh` can never both be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    status: SessionStatus,
}

impl ValidationResult {
    /// Wraps a classification.
    pub fn new(status: SessionStatus) -> Self {
        Self { status }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// The session can be used for a request right now.
    pub fn is_valid(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::ExpiringSoon | SessionStatus::Healthy
        )
    }

    /// A refresh should be attempted (expired or about to expire).
    pub fn needs_refresh(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Expired | SessionStatus::ExpiringSoon
        )
    }

    /// The session must be discarded.
    pub fn should_sign_out(&self) -> bool {
        matches!(self.status, SessionStatus::BackendError(_))
    }

    /// The backend failure message, when classification failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            SessionStatus::BackendError(message) => Some(message),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// NoticeKind
// ---------------------------------------------------------------------------

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Error,
}

// =========================================================================
// Tests
// =========================================================================
