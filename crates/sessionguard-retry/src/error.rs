//! Error type for retry runs.

/// Why a retry run ended without a value.
///
/// `E` is the wrapped operation's own error type. Only
/// [`RetryError::Operation`] carries one: cancellation and deadlines stop
/// the run from the outside.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed. Holds the error from the last one.
    #[error("{0}")]
    Operation(E),

    /// The run's [`CancelSignal`](crate::CancelSignal) fired.
    #[error("retry cancelled")]
    Cancelled,

    /// The run's deadline passed, or the next backoff sleep would have
    /// overshot it.
    #[error("retry deadline exceeded")]
    DeadlineExceeded,
}

impl<E> RetryError<E> {
    /// The last operation error, if the run got as far as exhausting its
    /// attempts.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Converts the operation error, leaving the other variants as they are.
    pub fn map<F, U>(self, f: F) -> RetryError<U>
    where
        F: FnOnce(E) -> U,
    {
        match self {
            RetryError::Operation(e) => RetryError::Operation(f(e)),
            RetryError::Cancelled => RetryError::Cancelled,
            RetryError::DeadlineExceeded => RetryError::DeadlineExceeded,
        }
    }
}
