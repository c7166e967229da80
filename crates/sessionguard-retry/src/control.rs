//! Deadline and cancellation for retry runs.
//!
//! [`CancelSignal::new`] returns a pair: the [`CancelHandle`] stays with
//! whoever owns the work (a shutdown hook, a context object) and the
//! [`CancelSignal`] is cloned into every run that should stop with it.
//! Underneath it is a `tokio::sync::watch` channel carrying one `bool`.

use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::RetryError;

// ---------------------------------------------------------------------------
// CancelSignal / CancelHandle
// ---------------------------------------------------------------------------

/// Owner side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Cancels every [`CancelSignal`] created from this pair. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// A new observer for this pair.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observer side of a cancellation pair. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Creates a fresh, un-cancelled pair.
    pub fn new() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the pair is cancelled.
    ///
    /// If every handle is dropped without cancelling, nobody can cancel
    /// any more and this pends forever.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// RetryControl
// ---------------------------------------------------------------------------

/// Why a guarded wait stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

impl Interrupt {
    pub(crate) fn into_error<E>(self) -> RetryError<E> {
        match self {
            Interrupt::Cancelled => RetryError::Cancelled,
            Interrupt::DeadlineExceeded => RetryError::DeadlineExceeded,
        }
    }
}

/// Termination bounds for one retry run.
///
/// The default has neither a deadline nor a cancel signal, so the run is
/// bounded only by the policy's attempt count and delay cap.
#[derive(Debug, Clone, Default)]
pub struct RetryControl {
    /// Absolute point in time after which no attempt or sleep continues.
    pub deadline: Option<Instant>,

    /// External stop signal.
    pub cancel: Option<CancelSignal>,
}

impl RetryControl {
    /// A control that gives up `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    /// Adds a cancel signal.
    pub fn cancel_on(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Adds (or tightens) the deadline.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// `true` if the run should not start another step right now.
    pub(crate) fn interrupted(&self) -> Option<Interrupt> {
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Some(Interrupt::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(Interrupt::DeadlineExceeded);
        }
        None
    }

    /// Drives `fut` unless cancellation or the deadline comes first.
    pub(crate) async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        if let Some(interrupt) = self.interrupted() {
            return Err(interrupt);
        }

        let cancelled = async {
            match &self.cancel {
                Some(signal) => signal.cancelled().await,
                None => pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => time::sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(Interrupt::Cancelled),
            _ = expired => Err(Interrupt::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }

    /// Sleeps for `delay`. A sleep that would end past the deadline is
    /// not started at all.
    pub(crate) async fn sleep(&self, delay: Duration) -> Result<(), Interrupt> {
        if self.deadline.is_some_and(|d| Instant::now() + delay > d) {
            return Err(Interrupt::DeadlineExceeded);
        }
        self.guard(time::sleep(delay)).await
    }
}
