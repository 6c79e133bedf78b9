//! One-shot deferred-execution thread handles.
//!
//! A [`ThreadHandle`] captures an [`Invocation`] at construction and runs it
//! on its own native thread when [`start`](ThreadHandle::start) is called.
//!
//! ```text
//! Created --start()--> Started --returned--> Completed
//!    ^                    \------raised----> Failed
//!    \--spawn failure (handle stays Created, start may be retried)
//! ```
//!
//! While the spawner runs, the handle holds an internal `Starting` marker.
//! It reads as `Created`; `start` and the join family wait for it to settle.
//!
//! The payload and the completion slot live behind an `Arc` shared with the
//! spawned thread. Dropping a started handle blocks until the native thread
//! has been joined.

use std::fmt;
use std::num::NonZeroU64;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use portable_atomic::{AtomicU64, AtomicU8, Ordering};

use crate::errors::{CallError, HandleError, HandleResult};
use crate::guard::ExecutionGuard;
use crate::invocation::{Invocation, Keywords};
use crate::native::{Entry, NativeConfig, NativeThread, Spawner};
use crate::value::Value;

macro_rules! handle_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "handle-trace")]
        tracing::trace!($($arg)*);
    };
}

pub mod builder;
mod completion;

pub use builder::HandleBuilder;
pub use completion::Outcome;

use completion::Completion;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Raw state while `start` is inside the spawner. Never exposed.
const STARTING: u8 = 4;

/// Unique identifier for handles. Never zero, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(NonZeroU64);

impl HandleId {
    fn next() -> Self {
        let raw = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Get the raw ID value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandleState {
    /// Constructed, no native thread yet
    Created = 0,
    /// Native thread spawned, invocation not finished
    Started = 1,
    /// Invocation returned a value
    Completed = 2,
    /// Invocation raised or panicked
    Failed = 3,
}

impl HandleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => HandleState::Started,
            2 => HandleState::Completed,
            3 => HandleState::Failed,
            // Created, or STARTING
            _ => HandleState::Created,
        }
    }

    /// `Completed` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, HandleState::Completed | HandleState::Failed)
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandleState::Created => "created",
            HandleState::Started => "started",
            HandleState::Completed => "completed",
            HandleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Data shared between the handle and its spawned thread.
struct Shared {
    id: HandleId,
    invocation: Invocation,
    state: AtomicU8,
    completion: Completion,
}

impl Shared {
    fn state(&self) -> HandleState {
        HandleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Current state once any in-flight `start` has settled.
    fn settled_state(&self) -> HandleState {
        loop {
            let raw = self.state.load(Ordering::Acquire);
            if raw != STARTING {
                return HandleState::from_u8(raw);
            }
            // Yield so the starting thread can finish its spawn
            thread::yield_now();
        }
    }

    /// Entry point body, runs on the spawned thread.
    fn run(&self, guard: &dyn ExecutionGuard) {
        handle_trace!(handle_id = %self.id, "invocation running");

        let mut outcome = None;
        let entered = panic::catch_unwind(AssertUnwindSafe(|| {
            guard.enter(&mut || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| self.invocation.invoke()));
                outcome = Some(match result {
                    Ok(returned) => Outcome::from(returned),
                    Err(payload) => Outcome::Raised(CallError::panicked(&*payload)),
                });
            });
        }));

        let outcome = match (entered, outcome) {
            (Ok(()), Some(outcome)) => outcome,
            (Ok(()), None) => Outcome::Raised(CallError::new(
                "GuardError",
                "execution guard returned without running the target",
            )),
            (Err(payload), _) => Outcome::Raised(CallError::panicked(&*payload)),
        };

        let state = if outcome.is_returned() {
            HandleState::Completed
        } else {
            HandleState::Failed
        };

        if let Outcome::Raised(error) = &outcome {
            if error.is_panic() {
                tracing::error!(handle_id = %self.id, %error, "target panicked");
            } else {
                tracing::debug!(handle_id = %self.id, %error, "target raised");
            }
        }

        // Outcome first, then state, then wake joiners.
        self.completion.store(outcome);
        self.state.store(state as u8, Ordering::Release);
        self.completion.notify();

        handle_trace!(handle_id = %self.id, %state, "invocation finished");
    }
}

/// The native thread slot of a handle.
enum NativeSlot {
    /// `start` has not succeeded yet
    Empty,
    /// Spawned, not yet reclaimed
    Running(NativeThread),
    /// Joined; only the id remains
    Reclaimed(std::thread::ThreadId),
}

/// A deferred, one-shot unit of work run on its own native thread.
///
/// # Example
///
/// ```
/// use deferred_thread::{ThreadHandle, Value};
///
/// let handle = ThreadHandle::new(Value::function(|_| Ok(Value::Int(42)))).unwrap();
/// handle.start().unwrap();
/// assert_eq!(handle.join().unwrap().value(), Some(&Value::Int(42)));
/// assert!(handle.completed());
/// ```
pub struct ThreadHandle {
    shared: Arc<Shared>,
    native: spin::Mutex<NativeSlot>,
    native_config: NativeConfig,
    guard: Arc<dyn ExecutionGuard>,
    spawner: Arc<dyn Spawner>,
}

impl ThreadHandle {
    /// Capture a call of `target` with no arguments and an empty name.
    pub fn new(target: Value) -> HandleResult<Self> {
        HandleBuilder::new(target).build()
    }

    /// Capture a call of `target(*positional, **keyword)`.
    pub fn with_arguments(
        target: Value,
        name: impl Into<String>,
        positional: Vec<Value>,
        keyword: Keywords,
    ) -> HandleResult<Self> {
        HandleBuilder::new(target)
            .name(name)
            .positional(positional)
            .keyword(keyword)
            .build()
    }

    /// Start configuring a handle for `target`.
    pub fn builder(target: Value) -> HandleBuilder {
        HandleBuilder::new(target)
    }

    fn from_parts(
        invocation: Invocation,
        native_config: NativeConfig,
        guard: Arc<dyn ExecutionGuard>,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        let id = HandleId::next();
        handle_trace!(handle_id = %id, name = invocation.name(), "handle created");

        Self {
            shared: Arc::new(Shared {
                id,
                invocation,
                state: AtomicU8::new(HandleState::Created as u8),
                completion: Completion::new(),
            }),
            native: spin::Mutex::new(NativeSlot::Empty),
            native_config,
            guard,
            spawner,
        }
    }

    /// Spawn the native thread and begin the invocation. Does not block.
    ///
    /// Fails with `AlreadyStarted` if the handle has left `Created`. On
    /// `SpawnFailure` the handle stays `Created` and `start` may be retried,
    /// unless the spawner already ran the invocation. Concurrent calls wait
    /// for an in-flight attempt to settle.
    pub fn start(&self) -> HandleResult<()> {
        let id = self.shared.id;
        loop {
            match self.shared.state.compare_exchange(
                HandleState::Created as u8,
                STARTING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                // Another start is inside the spawner; it may still fail
                Err(STARTING) => thread::yield_now(),
                Err(_) => return Err(HandleError::AlreadyStarted),
            }
        }

        let shared = Arc::clone(&self.shared);
        let guard = Arc::clone(&self.guard);
        let entry: Entry = Box::new(move || shared.run(&*guard));

        match self.spawner.spawn(&self.native_config, entry) {
            Ok(native) => {
                *self.native.lock() = NativeSlot::Running(native);
                // Fails only if the invocation already finished and stored
                // its terminal state, which must be kept.
                let _ = self.shared.state.compare_exchange(
                    STARTING,
                    HandleState::Started as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                tracing::debug!(handle_id = %id, name = self.name(), "thread handle started");
                Ok(())
            }
            Err(error) => {
                let rolled_back = self
                    .shared
                    .state
                    .compare_exchange(
                        STARTING,
                        HandleState::Created as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                if rolled_back {
                    tracing::error!(handle_id = %id, %error, "failed to spawn native thread");
                } else {
                    tracing::warn!(
                        handle_id = %id,
                        %error,
                        state = %self.state(),
                        "spawner ran the entry before failing, keeping terminal state"
                    );
                }
                Err(HandleError::spawn_failure(&error))
            }
        }
    }

    /// Block until the invocation has finished and return its outcome.
    ///
    /// Joining a finished handle returns the same outcome again without
    /// re-running the target.
    pub fn join(&self) -> HandleResult<&Outcome> {
        self.ensure_started()?;
        handle_trace!(handle_id = %self.shared.id, "joining");

        let outcome = self.shared.completion.wait().ok_or_else(Self::missing_outcome)?;
        self.reclaim()?;
        Ok(outcome)
    }

    /// Like [`join`](Self::join) but gives up after `timeout` with `Timeout`.
    ///
    /// A timed-out handle is unaffected and can be joined again later.
    pub fn join_timeout(&self, timeout: Duration) -> HandleResult<&Outcome> {
        self.ensure_started()?;

        let outcome = self
            .shared
            .completion
            .wait_timeout(timeout)
            .ok_or(HandleError::Timeout)?;
        self.reclaim()?;
        Ok(outcome)
    }

    /// Non-blocking join: `Ok(None)` while the invocation is still running.
    pub fn try_join(&self) -> HandleResult<Option<&Outcome>> {
        self.ensure_started()?;

        match self.shared.completion.get() {
            Some(outcome) => {
                self.reclaim()?;
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    /// Join and flatten the outcome: a raised error becomes `TargetRaised`.
    pub fn join_value(&self) -> HandleResult<Value> {
        self.join()?
            .clone()
            .into_result()
            .map_err(HandleError::TargetRaised)
    }

    fn ensure_started(&self) -> HandleResult<()> {
        if self.shared.settled_state() == HandleState::Created {
            return Err(HandleError::NotStarted);
        }
        Ok(())
    }

    fn missing_outcome() -> HandleError {
        HandleError::JoinFailure(String::from("thread finished without publishing an outcome"))
    }

    /// Join the OS thread once its invocation has finished.
    fn reclaim(&self) -> HandleResult<()> {
        let native = {
            let mut slot = self.native.lock();
            // Empty means the spawner has not handed the thread back yet
            let thread_id = match &*slot {
                NativeSlot::Running(native) => native.thread_id(),
                NativeSlot::Empty | NativeSlot::Reclaimed(_) => return Ok(()),
            };
            match core::mem::replace(&mut *slot, NativeSlot::Reclaimed(thread_id)) {
                NativeSlot::Running(native) => native,
                _ => return Ok(()),
            }
        };

        native.join().map_err(|error| {
            tracing::error!(handle_id = %self.shared.id, %error, "native join failed");
            error
        })
    }

    /// Unique id of this handle.
    pub fn id(&self) -> HandleId {
        self.shared.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HandleState {
        self.shared.state()
    }

    /// `true` once `start` has succeeded.
    pub fn started(&self) -> bool {
        self.state() != HandleState::Created
    }

    /// `true` once the target has returned normally.
    pub fn completed(&self) -> bool {
        self.state() == HandleState::Completed
    }

    /// `true` once the target has raised or panicked.
    pub fn failed(&self) -> bool {
        self.state() == HandleState::Failed
    }

    /// `true` in either terminal state.
    pub fn finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// The captured outcome, if the invocation has finished.
    pub fn result(&self) -> Option<&Outcome> {
        self.shared.completion.get()
    }

    /// The captured call payload.
    pub fn invocation(&self) -> &Invocation {
        &self.shared.invocation
    }

    /// Handle name, empty by default.
    pub fn name(&self) -> &str {
        self.shared.invocation.name()
    }

    /// The value that will be (or was) invoked.
    pub fn target(&self) -> &Value {
        self.shared.invocation.target()
    }

    /// Positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        self.shared.invocation.positional()
    }

    /// Keyword arguments in the order supplied.
    pub fn keyword(&self) -> &Keywords {
        self.shared.invocation.keyword()
    }

    /// Id of the native thread, once one has been spawned.
    pub fn native_thread_id(&self) -> Option<std::thread::ThreadId> {
        match &*self.native.lock() {
            NativeSlot::Empty => None,
            NativeSlot::Running(native) => Some(native.thread_id()),
            NativeSlot::Reclaimed(id) => Some(*id),
        }
    }
}

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        let slot = core::mem::replace(self.native.get_mut(), NativeSlot::Empty);
        if let NativeSlot::Running(native) = slot {
            if !self.shared.state().is_terminal() {
                tracing::warn!(
                    handle_id = %self.shared.id,
                    name = self.name(),
                    "dropping unjoined thread handle, blocking until it finishes"
                );
            }
            if let Err(error) = native.join() {
                tracing::error!(handle_id = %self.shared.id, %error, "native join failed during drop");
            }
        }
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("invocation", &self.shared.invocation)
            .field("result", &self.result())
            .finish()
    }
}
