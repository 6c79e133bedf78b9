//! Test helper utilities and common functionality.

use std::io;
use std::sync::{Arc, Barrier};

use portable_atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::errors::CallError;
use crate::native::{Entry, NativeConfig, NativeThread, OsSpawner, Spawner};
use crate::value::Value;

/// A target that always returns `value`.
pub(crate) fn returning(value: Value) -> Value {
    Value::function(move |_| Ok(value.clone()))
}

/// A target that always raises `error`.
pub(crate) fn raising(error: CallError) -> Value {
    Value::function(move |_| Err(error.clone()))
}

/// A target that counts how many times it was invoked.
pub(crate) fn counting(calls: Arc<AtomicU64>) -> Value {
    Value::function(move |_| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Value::Int(n as i64))
    })
}

/// The `_func(x, y, *, message)` target used across the suites.
pub(crate) fn message_sum() -> Value {
    Value::named_function("_func", |args| {
        let x = args.arg(0)?.as_int().unwrap_or_default();
        let y = args.arg(1)?.as_int().unwrap_or_default();
        let message = args
            .kwarg("message")?
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(Value::Str(format!("{message}{}", x + y)))
    })
}

/// A target that returns its positional arguments followed by its keyword
/// arguments as `(name, value)` pairs.
pub(crate) fn echo() -> Value {
    Value::named_function("echo", |args| {
        let mut items = args.positional().to_vec();
        for (name, value) in args.keyword().iter() {
            items.push(Value::Tuple(vec![Value::from(name), value.clone()]));
        }
        Ok(Value::Tuple(items))
    })
}

/// Holds a target inside its invocation until the test releases it.
#[derive(Clone)]
pub(crate) struct Gate {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            entered: Arc::new(Barrier::new(2)),
            release: Arc::new(Barrier::new(2)),
        }
    }

    /// A target that blocks on this gate, then returns `value`.
    pub(crate) fn target(&self, value: Value) -> Value {
        let gate = self.clone();
        Value::function(move |_| {
            gate.entered.wait();
            gate.release.wait();
            Ok(value.clone())
        })
    }

    /// Wait until the target is running.
    pub(crate) fn wait_entered(&self) {
        self.entered.wait();
    }

    /// Let the target return.
    pub(crate) fn open(&self) {
        self.release.wait();
    }
}

/// Refuses the first `failures` spawns like an exhausted OS, then spawns
/// normally.
pub(crate) struct FlakySpawner {
    failures: AtomicUsize,
    attempts: Arc<AtomicUsize>,
}

impl FlakySpawner {
    pub(crate) fn new(failures: usize) -> (Self, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let spawner = Self {
            failures: AtomicUsize::new(failures),
            attempts: Arc::clone(&attempts),
        };
        (spawner, attempts)
    }
}

impl Spawner for FlakySpawner {
    fn spawn(&self, config: &NativeConfig, entry: Entry) -> io::Result<NativeThread> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refuse = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refuse {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "Resource temporarily unavailable",
            ));
        }
        OsSpawner.spawn(config, entry)
    }
}

/// Blocks inside `spawn` until the test releases it, then refuses the spawn.
#[derive(Clone)]
pub(crate) struct StallingSpawner {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl StallingSpawner {
    pub(crate) fn new() -> Self {
        Self {
            entered: Arc::new(Barrier::new(2)),
            release: Arc::new(Barrier::new(2)),
        }
    }

    /// Wait until `start` is inside the spawner.
    pub(crate) fn wait_entered(&self) {
        self.entered.wait();
    }

    /// Let the spawner fail.
    pub(crate) fn release(&self) {
        self.release.wait();
    }
}

impl Spawner for StallingSpawner {
    fn spawn(&self, _config: &NativeConfig, _entry: Entry) -> io::Result<NativeThread> {
        self.entered.wait();
        self.release.wait();
        Err(io::Error::new(io::ErrorKind::WouldBlock, "thread limit reached"))
    }
}

/// A misbehaving spawner that runs the entry inline and then reports failure.
pub(crate) struct RunThenFailSpawner;

impl Spawner for RunThenFailSpawner {
    fn spawn(&self, _config: &NativeConfig, entry: Entry) -> io::Result<NativeThread> {
        entry();
        Err(io::Error::new(io::ErrorKind::Other, "spawn reported failure late"))
    }
}

/// Spawns OS threads that unwind after the entry has returned, as a thread
/// torn down by its runtime would.
pub(crate) struct UnwindingSpawner;

impl Spawner for UnwindingSpawner {
    fn spawn(&self, config: &NativeConfig, entry: Entry) -> io::Result<NativeThread> {
        OsSpawner.spawn(
            config,
            Box::new(move || {
                entry();
                panic!("torn down");
            }),
        )
    }
}
