//! Completion signal between the spawned thread and its joiners.

use std::sync::{Condvar, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use crate::errors::CallError;
use crate::value::Value;

/// What the invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The target returned normally
    Returned(Value),
    /// The target raised (or panicked)
    Raised(CallError),
}

impl Outcome {
    pub fn is_returned(&self) -> bool {
        matches!(self, Outcome::Returned(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Returned(v) => Some(v),
            Outcome::Raised(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CallError> {
        match self {
            Outcome::Returned(_) => None,
            Outcome::Raised(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<Value, CallError> {
        match self {
            Outcome::Returned(v) => Ok(v),
            Outcome::Raised(e) => Err(e),
        }
    }
}

impl From<Result<Value, CallError>> for Outcome {
    fn from(result: Result<Value, CallError>) -> Self {
        match result {
            Ok(v) => Outcome::Returned(v),
            Err(e) => Outcome::Raised(e),
        }
    }
}

/// One-shot completion event carrying the [`Outcome`].
///
/// The outcome is written once, then `done` is flipped under the mutex, so a
/// waiter that observes `done` always observes the full outcome.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    outcome: OnceLock<Outcome>,
    done: Mutex<bool>,
    signal: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record the outcome. Returns `false` if one was already recorded.
    pub(crate) fn store(&self, outcome: Outcome) -> bool {
        self.outcome.set(outcome).is_ok()
    }

    /// Wake every waiter. Must follow [`store`](Self::store).
    pub(crate) fn notify(&self) {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        *done = true;
        self.signal.notify_all();
    }

    /// The outcome, if the spawned thread has published it.
    pub(crate) fn get(&self) -> Option<&Outcome> {
        if *self.done.lock().unwrap_or_else(PoisonError::into_inner) {
            self.outcome.get()
        } else {
            None
        }
    }

    /// Block until the outcome is published.
    pub(crate) fn wait(&self) -> Option<&Outcome> {
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        while !*done {
            done = self
                .signal
                .wait(done)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(done);
        self.outcome.get()
    }

    /// Block for at most `timeout`. `None` means the deadline passed first.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> Option<&Outcome> {
        let deadline = Instant::now() + timeout;
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        while !*done {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            done = self
                .signal
                .wait_timeout(done, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        drop(done);
        self.outcome.get()
    }
}
