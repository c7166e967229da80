//! Unified error type for sessionguard.

use std::path::PathBuf;

use sessionguard_protocol::BackendError;
use sessionguard_session::{ReloginError, SessionError};
use sessionguard_storage::StorageError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `sessionguard` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SessionGuardError {
    /// The auth backend reported a failure.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A storage layer could not be read or changed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Validation, refresh or sign-in failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Automatic re-login did not restore the session.
    #[error(transparent)]
    Relogin(#[from] ReloginError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a [`SessionGuardConfig`](crate::SessionGuardConfig) could not be
/// loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_backend_error() {
        let err = BackendError::Unreachable("dns".into());
        let guard_err: SessionGuardError = err.into();
        assert!(matches!(guard_err, SessionGuardError::Backend(_)));
        assert!(guard_err.to_string().contains("dns"));
    }

    #[test]
    fn test_from_storage_error() {
        let err = StorageError::Unavailable("quota".into());
        let guard_err: SessionGuardError = err.into();
        assert!(matches!(guard_err, SessionGuardError::Storage(_)));
    }

    #[test]
    fn test_from_session_error() {
        let guard_err: SessionGuardError = SessionError::SessionUnavailable.into();
        assert!(matches!(guard_err, SessionGuardError::Session(_)));
    }

    #[test]
    fn test_from_relogin_error() {
        let guard_err: SessionGuardError = ReloginError::NoCredentials.into();
        assert!(matches!(guard_err, SessionGuardError::Relogin(_)));
    }

    #[test]
    fn test_from_parse_error_goes_through_config() {
        let parse = serde_json::from_str::<u32>("nope").unwrap_err();
        let guard_err: SessionGuardError = ConfigError::from(parse).into();
        assert!(matches!(guard_err, SessionGuardError::Config(ConfigError::Parse(_))));
        assert!(guard_err.to_string().starts_with("invalid config"));
    }
}
