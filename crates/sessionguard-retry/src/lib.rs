//! Exponential-backoff retry executor for sessionguard.
//!
//! Runs any async operation up to `max_retries + 1` times, sleeping
//! `min(max_delay, base_delay * backoff_factor^n)` between attempts
//! (optionally scaled by a random factor in `[0.5, 1.0)`). The executor
//! knows nothing about sessions; the re-login coordinator and API callers
//! hand it whatever they need repeated.
//!
//! # Bounded termination
//!
//! A long-running service has no page teardown to stop a runaway retry
//! loop, so every run can carry a [`RetryControl`]: an absolute deadline
//! and a [`CancelSignal`]. Both are honoured at every suspension point,
//! i.e. while an attempt is in flight and during each backoff sleep.
//!
//! ```ignore
//! let result = retry(|| backend.sign_in_with_password(&creds), &RetryPolicy::auth()).await;
//! if result.is_success() {
//!     tracing::info!(attempts = result.attempts, "signed in");
//! }
//! ```
//!
//! The wrapped operation may run several times. Making it safe to repeat
//! is the caller's job.

mod control;
mod error;
mod executor;
mod policy;

pub use control::{CancelHandle, CancelSignal, RetryControl};
pub use error::RetryError;
pub use executor::{RetryResult, retry, retry_with};
pub use policy::RetryPolicy;
