//! Integration tests for the retry executor.
//!
//! Uses `tokio::time::pause()` (via `start_paused`) so backoff sleeps
//! resolve instantly and elapsed times are exact.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use sessionguard_retry::{CancelSignal, RetryControl, RetryError, RetryPolicy, retry, retry_with};
use tokio::sync::Mutex;
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

fn policy_1s_doubling() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1000),
        max_delay: Duration::from_millis(10_000),
        backoff_factor: 2.0,
        jitter: false,
    }
}

/// An operation that fails `failures` times, then returns the attempt number.
fn flaky(failures: u32) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<u32, String>>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let op = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        std::future::ready(if n <= failures {
            Err(format!("failure {n}"))
        } else {
            Ok(n)
        })
    };
    (calls, op)
}

// =========================================================================
// Success and exhaustion
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_first_attempt_success_returns_immediately() {
    let (calls, op) = flaky(0);

    let result = retry(op, &policy_1s_doubling()).await;

    assert!(result.is_success());
    assert_eq!(result.value(), Some(&1));
    assert_eq!(result.attempts, 1);
    assert_eq!(result.elapsed, Duration::ZERO);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_after_failures_reports_attempts_and_elapsed() {
    let (_, op) = flaky(2);

    let result = retry(op, &policy_1s_doubling()).await;

    assert_eq!(result.value(), Some(&3));
    assert_eq!(result.attempts, 3);
    // 1000 ms + 2000 ms of backoff.
    assert_eq!(result.elapsed, Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhausted_returns_last_error() {
    let (calls, op) = flaky(u32::MAX);

    let result = retry(op, &policy_1s_doubling()).await;

    assert!(!result.is_success());
    assert_eq!(result.attempts, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(
        result.into_result(),
        Err(RetryError::Operation("failure 4".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_zero_retries_runs_once_without_sleeping() {
    let (calls, op) = flaky(u32::MAX);
    let policy = RetryPolicy {
        max_retries: 0,
        ..policy_1s_doubling()
    };

    let result = retry(op, &policy).await;

    assert_eq!(result.attempts, 1);
    assert_eq!(result.elapsed, Duration::ZERO);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =========================================================================
// Backoff timing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_delays_between_attempts_are_exact_without_jitter() {
    let starts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&starts);

    let result = retry(
        || {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().await.push(Instant::now());
                Err::<(), _>("down")
            }
        },
        &policy_1s_doubling(),
    )
    .await;

    assert_eq!(result.attempts, 4);
    let starts = starts.lock().await;
    let gaps: Vec<u128> = starts
        .windows(2)
        .map(|w| (w[1] - w[0]).as_millis())
        .collect();
    assert_eq!(gaps, vec![1000, 2000, 4000]);
    // No sleep after the final attempt.
    assert_eq!(result.elapsed, Duration::from_millis(7000));
}

#[tokio::test(start_paused = true)]
async fn test_retry_delays_are_capped_at_max_delay() {
    let policy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(5),
        backoff_factor: 3.0,
        jitter: false,
    };
    let (_, op) = flaky(u32::MAX);

    let result = retry(op, &policy).await;

    // 2 s, then 6 s capped to 5 s, then 18 s capped to 5 s.
    assert_eq!(result.elapsed, Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn test_retry_with_jitter_never_exceeds_unjittered_total() {
    let policy = RetryPolicy {
        jitter: true,
        ..policy_1s_doubling()
    };
    let (_, op) = flaky(u32::MAX);

    let result = retry(op, &policy).await;

    assert!(result.elapsed >= Duration::from_millis(3500));
    assert!(result.elapsed <= Duration::from_millis(7000));
}

// =========================================================================
// Deadline and cancellation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_with_deadline_refuses_overshooting_sleep() {
    let (calls, op) = flaky(u32::MAX);
    // Enough for the 1 s and 2 s sleeps, not the 4 s one.
    let control = RetryControl::with_timeout(Duration::from_millis(5000));

    let result = retry_with(op, &policy_1s_doubling(), &control).await;

    assert_eq!(result.error(), Some(&RetryError::DeadlineExceeded));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.elapsed, Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_retry_with_deadline_interrupts_slow_attempt() {
    let control = RetryControl::with_timeout(Duration::from_secs(1));

    let result = retry_with(
        || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, String>(())
        },
        &policy_1s_doubling(),
        &control,
    )
    .await;

    assert_eq!(result.error(), Some(&RetryError::DeadlineExceeded));
    assert_eq!(result.attempts, 1);
    assert_eq!(result.elapsed, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_retry_with_cancel_during_backoff_stops_run() {
    let (handle, signal) = CancelSignal::new();
    let control = RetryControl::default().cancel_on(signal);
    let (calls, op) = flaky(u32::MAX);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.cancel();
    });

    let result = retry_with(op, &policy_1s_doubling(), &control).await;
    canceller.await.unwrap();

    assert_eq!(result.error(), Some(&RetryError::Cancelled));
    // Attempt 1 at 0 ms, attempt 2 at 1000 ms, cancelled while sleeping 2000 ms.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.elapsed, Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_retry_with_already_cancelled_makes_no_attempt() {
    let (handle, signal) = CancelSignal::new();
    handle.cancel();
    let control = RetryControl::default().cancel_on(signal);
    let (calls, op) = flaky(0);

    let result = retry_with(op, &policy_1s_doubling(), &control).await;

    assert_eq!(result.error(), Some(&RetryError::Cancelled));
    assert_eq!(result.attempts, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
