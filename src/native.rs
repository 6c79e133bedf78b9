//! Native thread adapter.
//!
//! The handle never talks to `std::thread` directly; it goes through a
//! [`Spawner`], so hosts can substitute their own thread creation (and tests
//! can simulate the OS refusing to create a thread).

use std::fmt;
use std::io;
use std::thread;

use crate::errors::{CallError, HandleError, HandleResult};

/// Entry point run on the new native thread.
pub type Entry = Box<dyn FnOnce() + Send + 'static>;

/// Parameters for one native thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeConfig {
    /// OS-visible thread name, if any
    pub name: Option<String>,
    /// Stack size in bytes; `None` uses the platform default
    pub stack_size: Option<usize>,
}

/// Creates native OS threads.
pub trait Spawner: Send + Sync {
    /// Spawn `entry` on a new OS thread.
    ///
    /// `entry` must not run if `Err` is returned.
    fn spawn(&self, config: &NativeConfig, entry: Entry) -> io::Result<NativeThread>;
}

/// Spawns through `std::thread::Builder`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSpawner;

impl Spawner for OsSpawner {
    fn spawn(&self, config: &NativeConfig, entry: Entry) -> io::Result<NativeThread> {
        let mut builder = thread::Builder::new();
        if let Some(name) = &config.name {
            builder = builder.name(name.clone());
        }
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(entry).map(NativeThread::new)
    }
}

/// Ownership of exactly one OS thread.
pub struct NativeThread {
    inner: thread::JoinHandle<()>,
}

impl NativeThread {
    /// Wrap a std join handle.
    pub fn new(inner: thread::JoinHandle<()>) -> Self {
        Self { inner }
    }

    /// OS-visible name of the thread.
    pub fn name(&self) -> Option<&str> {
        self.inner.thread().name()
    }

    /// OS-level id of the thread.
    pub fn thread_id(&self) -> thread::ThreadId {
        self.inner.thread().id()
    }

    /// Whether the OS thread has exited.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Block until the OS thread exits and reclaim it.
    pub fn join(self) -> HandleResult<()> {
        self.inner.join().map_err(|payload| {
            let cause = CallError::panicked(&*payload);
            HandleError::JoinFailure(cause.message().to_string())
        })
    }
}

impl fmt::Debug for NativeThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeThread")
            .field("id", &self.inner.thread().id())
            .field("name", &self.name())
            .finish()
    }
}
