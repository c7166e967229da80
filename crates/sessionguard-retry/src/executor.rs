//! The retry loop.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{RetryControl, RetryError, RetryPolicy};

/// Outcome of one retry run. Produced once, consumed by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryResult<T, E> {
    /// The value from the successful attempt, or why the run gave up.
    pub outcome: Result<T, RetryError<E>>,

    /// Attempts actually started (1-based; 0 only if the run was
    /// interrupted before the first attempt).
    pub attempts: u32,

    /// Wall-clock time from the start of the first attempt to the end of
    /// the run.
    pub elapsed: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// `true` if some attempt succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The successful attempt's value.
    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    /// Why the run gave up, if it did.
    pub fn error(&self) -> Option<&RetryError<E>> {
        self.outcome.as_ref().err()
    }

    /// Drops the bookkeeping and keeps the outcome.
    pub fn into_result(self) -> Result<T, RetryError<E>> {
        self.outcome
    }
}

/// Runs `operation` under `policy` with no deadline or cancel signal.
///
/// See [`retry_with`].
pub async fn retry<T, E, F, Fut>(operation: F, policy: &RetryPolicy) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    retry_with(operation, policy, &RetryControl::default()).await
}

/// Runs `operation` until it succeeds or the policy is exhausted.
///
/// Attempts are strictly sequential: attempt `n + 1` starts only after
/// attempt `n` has failed and its backoff sleep has finished. There is no
/// sleep after the final attempt. `control` can end the run early, while
/// an attempt is in flight or during a sleep.
pub async fn retry_with<T, E, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    control: &RetryControl,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let policy = policy.clone().validated();
    let max_attempts = policy.max_attempts();
    let started = Instant::now();
    let mut attempts: u32 = 0;

    let finish = |outcome: Result<T, RetryError<E>>, attempts: u32| RetryResult {
        outcome,
        attempts,
        elapsed: started.elapsed(),
    };

    loop {
        if let Some(interrupt) = control.interrupted() {
            debug!(attempts, ?interrupt, "run interrupted before next attempt");
            return finish(Err(interrupt.into_error()), attempts);
        }
        attempts += 1;
        trace!(attempt = attempts, max_attempts, "starting attempt");

        let result = match control.guard(operation()).await {
            Ok(result) => result,
            Err(interrupt) => {
                debug!(attempt = attempts, ?interrupt, "attempt interrupted");
                return finish(Err(interrupt.into_error()), attempts);
            }
        };

        let error = match result {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempts, "operation succeeded after retrying");
                }
                return finish(Ok(value), attempts);
            }
            Err(error) => error,
        };

        if attempts >= max_attempts {
            debug!(attempts, error = %error, "retries exhausted");
            return finish(Err(RetryError::Operation(error)), attempts);
        }

        let delay = policy.sleep_delay(attempts - 1);
        debug!(
            attempt = attempts,
            ?delay,
            error = %error,
            "attempt failed, backing off"
        );
        if let Err(interrupt) = control.sleep(delay).await {
            debug!(attempt = attempts, ?interrupt, "backoff interrupted");
            return finish(Err(interrupt.into_error()), attempts);
        }
    }
}
