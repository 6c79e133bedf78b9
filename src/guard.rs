//! Execution guards.
//!
//! A host may only allow one thread at a time to run its callables (an
//! interpreter lock, for example). The handle cannot know that, so the host
//! injects an [`ExecutionGuard`] which is held around every call to the
//! target on the spawned thread.

use std::sync::{Arc, Mutex, PoisonError};

use portable_atomic::{AtomicU64, Ordering};

/// Held around the target's invocation on the spawned thread.
pub trait ExecutionGuard: Send + Sync {
    /// Run `body` while holding whatever exclusion the host requires.
    fn enter(&self, body: &mut dyn FnMut());
}

/// No exclusion: the target runs fully in parallel with other threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unguarded;

impl ExecutionGuard for Unguarded {
    fn enter(&self, body: &mut dyn FnMut()) {
        body();
    }
}

/// A process-wide style lock: at most one guarded target runs at a time.
///
/// Clones share the same lock.
#[derive(Debug, Default, Clone)]
pub struct GlobalLock {
    inner: Arc<GlobalLockInner>,
}

#[derive(Debug, Default)]
struct GlobalLockInner {
    lock: Mutex<()>,
    entries: AtomicU64,
}

impl GlobalLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the lock has been entered.
    pub fn entries(&self) -> u64 {
        self.inner.entries.load(Ordering::Acquire)
    }
}

impl ExecutionGuard for GlobalLock {
    fn enter(&self, body: &mut dyn FnMut()) {
        // Poisoning is ignored, the lock protects no data.
        let _held = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.entries.fetch_add(1, Ordering::AcqRel);
        body();
    }
}
