//! Handle builder for configuring a deferred invocation.

use std::sync::Arc;

use super::ThreadHandle;
use crate::errors::HandleResult;
use crate::guard::{ExecutionGuard, Unguarded};
use crate::invocation::{Invocation, Keywords};
use crate::native::{NativeConfig, OsSpawner, Spawner};
use crate::value::Value;

/// Builder for configuring and creating new handles.
///
/// Nothing is validated until [`build`](Self::build): a non-callable target,
/// a name containing NUL, or a repeated keyword all surface there.
pub struct HandleBuilder {
    /// Value to invoke
    target: Value,
    /// Handle name, also used for the native thread when non-empty
    name: String,
    /// Positional arguments in call order
    positional: Vec<Value>,
    /// Keyword arguments in the order supplied
    keyword: Vec<(String, Value)>,
    /// Native stack size override
    stack_size: Option<usize>,
    /// Exclusion held around the call
    guard: Arc<dyn ExecutionGuard>,
    /// Native thread factory
    spawner: Arc<dyn Spawner>,
}

impl HandleBuilder {
    /// Builder for `target` with an empty name and no arguments.
    pub fn new(target: Value) -> Self {
        Self {
            target,
            name: String::new(),
            positional: Vec::new(),
            keyword: Vec::new(),
            stack_size: None,
            guard: Arc::new(Unguarded),
            spawner: Arc::new(OsSpawner),
        }
    }

    /// Set the handle name, also used for the OS thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the positional arguments.
    pub fn positional(mut self, args: Vec<Value>) -> Self {
        self.positional = args;
        self
    }

    /// Append one positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append every entry of `keyword`.
    pub fn keyword(mut self, keyword: Keywords) -> Self {
        self.keyword.extend(
            keyword
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone())),
        );
        self
    }

    /// Append one keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }

    /// Stack size for the OS thread, in bytes.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Run the target inside `guard`.
    pub fn guard(mut self, guard: impl ExecutionGuard + 'static) -> Self {
        self.guard = Arc::new(guard);
        self
    }

    /// Like `guard`, for a guard already shared with other handles.
    pub fn shared_guard(mut self, guard: Arc<dyn ExecutionGuard>) -> Self {
        self.guard = guard;
        self
    }

    /// Create the native thread through `spawner` instead of `OsSpawner`.
    pub fn spawner(mut self, spawner: impl Spawner + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// Validate and capture the invocation. The handle starts in `Created`.
    pub fn build(self) -> HandleResult<ThreadHandle> {
        let keyword = Keywords::try_from(self.keyword)?;
        let native_config = NativeConfig {
            name: (!self.name.is_empty()).then(|| self.name.clone()),
            stack_size: self.stack_size,
        };
        let invocation = Invocation::new(self.target, self.name, self.positional, keyword)?;

        Ok(ThreadHandle::from_parts(
            invocation,
            native_config,
            self.guard,
            self.spawner,
        ))
    }
}
