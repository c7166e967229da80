//! Error types for the storage layer.

/// Errors a storage layer can report.
///
/// These never escape [`SessionCleanup`](crate::SessionCleanup): a sweep
/// logs them and moves on to the next key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The key or database exists but could not be removed.
    #[error("failed to remove {0}")]
    RemoveFailed(String),

    /// The layer itself cannot be used (quota, disabled, torn down).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
