//! Errors an auth backend can report.
//!
//! Backends translate their own failures (HTTP status codes, socket
//! errors, JSON decoding) into one of these variants. The session layer
//! does not look deeper than [`BackendError::is_transient`].

/// A failed auth backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The service could not be reached: DNS, connect, timeout, 5xx.
    #[error("auth backend unreachable: {0}")]
    Unreachable(String),

    /// The service answered and said no (bad password, revoked refresh
    /// token, disabled account).
    #[error("auth backend rejected the request: {0}")]
    Rejected(String),

    /// The response could not be understood as a session.
    #[error("malformed session: {0}")]
    Malformed(String),

    /// The call succeeded but carried no session.
    #[error("no session returned")]
    NoSession,
}

impl BackendError {
    /// Returns true if retrying the same call later could succeed.
    ///
    /// Only connectivity failures qualify. A rejection will be rejected
    /// again, and a malformed response points at a broken backend.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unreachable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_unreachable() {
        assert!(BackendError::Unreachable("connect refused".into()).is_transient());
    }

    #[test]
    fn test_is_not_transient_rejected() {
        assert!(!BackendError::Rejected("invalid login".into()).is_transient());
    }

    #[test]
    fn test_is_not_transient_malformed_or_missing() {
        assert!(!BackendError::Malformed("no expiry".into()).is_transient());
        assert!(!BackendError::NoSession.is_transient());
    }

    #[test]
    fn test_display_includes_cause() {
        let err = BackendError::Rejected("invalid login".into());
        assert_eq!(
            err.to_string(),
            "auth backend rejected the request: invalid login"
        );
    }
}
