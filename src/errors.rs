//! Error handling for thread handles.
//!
//! Two kinds of failure live here. [`HandleError`] is what the lifecycle
//! operations of a [`ThreadHandle`](crate::ThreadHandle) return to their
//! caller. [`CallError`] is the host-side error value a target produces when
//! its invocation fails; it is captured on the spawned thread and only ever
//! surfaced through `join`.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type for handle operations.
pub type HandleResult<T> = Result<T, HandleError>;

/// Every way a handle operation can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// The supplied target does not have the callable capability.
    #[error("'target' must be a callable, got {type_name}")]
    InvalidTarget {
        /// Host type name of the rejected value
        type_name: &'static str,
    },
    /// The name cannot be handed to the native thread.
    #[error("invalid thread name {0:?}: names may not contain NUL bytes")]
    InvalidName(String),
    /// The same keyword argument was supplied twice.
    #[error("duplicate keyword argument '{0}'")]
    DuplicateKeyword(String),
    /// `start` was called on a handle that already left `Created`.
    #[error("thread handle has already been started")]
    AlreadyStarted,
    /// The operating system refused to create the native thread.
    #[error("failed to spawn native thread ({kind:?}): {message}")]
    SpawnFailure {
        /// Kind reported by the OS
        kind: io::ErrorKind,
        /// OS error text
        message: String,
    },
    /// `join` was called on a handle that was never started.
    #[error("thread handle has not been started")]
    NotStarted,
    /// The native join primitive reported a failure.
    #[error("failed to join native thread: {0}")]
    JoinFailure(String),
    /// The invocation itself failed on the spawned thread.
    #[error("target raised: {0}")]
    TargetRaised(CallError),
    /// A bounded join gave up before the thread finished.
    #[error("join timed out before the thread finished")]
    Timeout,
}

impl HandleError {
    /// Build a spawn failure from the error returned by the native spawner.
    pub fn spawn_failure(error: &io::Error) -> Self {
        HandleError::SpawnFailure {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Whether repeating the same operation may succeed.
    ///
    /// Only spawn failures and timeouts are retryable: the handle is left in
    /// the state it had before the call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandleError::SpawnFailure { .. } | HandleError::Timeout)
    }
}

impl From<io::Error> for HandleError {
    fn from(error: io::Error) -> Self {
        HandleError::spawn_failure(&error)
    }
}

/// An error raised by a target during its invocation.
///
/// Mirrors a host exception: a kind (the exception type) and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    kind: String,
    message: String,
}

/// Kind recorded for panics caught inside a target.
pub const PANIC_KIND: &str = "Panic";

impl CallError {
    /// Create a new call error.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Wrap a panic payload caught on the spawned thread.
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("<non-string panic payload>")
        };
        Self::new(PANIC_KIND, message)
    }

    /// The error kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error came from a caught panic.
    pub fn is_panic(&self) -> bool {
        self.kind == PANIC_KIND
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for CallError {}
