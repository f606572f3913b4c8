//! Cooperative cancellation and interruptible waiting.
//!
//! The pipeline is synchronous, so cancellation is a shared flag that each
//! stage polls between units of work. Waiting (retry backoff) goes through
//! the [`Clock`] trait so tests can run retry loops without real delays.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Error returned when an operation observed a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

#[derive(Debug, Default)]
struct TokenState {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

/// A cloneable cancellation flag shared between the caller and the pipeline.
///
/// # Examples
///
/// ```
/// use nori_installer::artefact::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Create a token that is not yet cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake any waiters.
    pub fn cancel(&self) {
        let mut cancelled = self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.state.signal.notify_all();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Return `Err(Cancelled)` if cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] once [`Self::cancel`] has been called.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Block for up to `duration`, returning early if cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if cancellation was requested before or during
    /// the wait.
    pub fn wait_timeout(&self, duration: Duration) -> Result<(), Cancelled> {
        let deadline = Instant::now() + duration;
        let mut cancelled = self
            .state
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if *cancelled {
                return Err(Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let (guard, _) = self
                .state
                .signal
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            cancelled = guard;
        }
    }
}

/// Source of (interruptible) sleeps for retry backoff.
pub trait Clock {
    /// Sleep for `duration` unless `cancel` fires first.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the wait was interrupted.
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled>;
}

/// Wall-clock implementation backed by the token's condition variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        cancel.wait_timeout(duration)
    }
}
