#![forbid(unsafe_code)]
#![forbid(unreachable_pub)]

//! One-shot deferred-execution thread handles.
//!
//! A [`ThreadHandle`] captures a callable and its positional and keyword
//! arguments when it is built, then runs that call on its own native OS
//! thread when started.
//!
//! # Lifecycle
//!
//! - `start` may succeed at most once; a second call fails with
//!   [`HandleError::AlreadyStarted`].
//! - `join` blocks until the call has finished and hands back its
//!   [`Outcome`]. It may be repeated; the target never runs twice.
//! - A failure inside the target is captured on the spawned thread and only
//!   surfaces through `join`.
//! - Dropping a started handle blocks until its native thread is joined.
//!
//! # Quick Start
//!
//! ```
//! use deferred_thread::{HandleBuilder, Value};
//!
//! let add = Value::function(|args| {
//!     let x = args.arg(0)?.as_int().unwrap_or_default();
//!     let y = args.arg(1)?.as_int().unwrap_or_default();
//!     let message = args.kwarg("message")?.as_str().unwrap_or_default().to_string();
//!     Ok(Value::Str(format!("{message}{}", x + y)))
//! });
//!
//! let handle = HandleBuilder::new(add)
//!     .name("adder")
//!     .arg(69000_i64)
//!     .arg(420_i64)
//!     .kwarg("message", "Poggers ")
//!     .build()
//!     .expect("target is callable");
//!
//! handle.start().expect("thread spawned");
//! assert_eq!(handle.join_value(), Ok(Value::from("Poggers 69420")));
//! ```
//!
//! # Features
//!
//! - `handle-trace`: emit `trace`-level `tracing` events for every
//!   lifecycle step

pub mod errors;
pub mod guard;
pub mod handle;
pub mod invocation;
pub mod native;
pub mod value;

#[cfg(test)]
mod tests;

// ============================================================================
// Public API
// ============================================================================

// Handles
pub use handle::{HandleBuilder, HandleId, HandleState, Outcome, ThreadHandle};

// Captured call
pub use invocation::{Arguments, Invocation, Keywords};
pub use value::{Callable, Function, Value};

// Host integration
pub use guard::{ExecutionGuard, GlobalLock, Unguarded};
pub use native::{NativeConfig, NativeThread, OsSpawner, Spawner};

// Errors
pub use errors::{CallError, HandleError, HandleResult};
