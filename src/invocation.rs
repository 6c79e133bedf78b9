//! The captured call payload.

use std::fmt;
use std::sync::Arc;

use crate::errors::{CallError, HandleError, HandleResult};
use crate::value::{Callable, Value};

/// Keyword arguments: unique names, kept in the order they were supplied.
#[derive(Clone, Default, PartialEq)]
pub struct Keywords {
    entries: Vec<(String, Value)>,
}

impl Keywords {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyword argument. Fails if `name` is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> HandleResult<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(HandleError::DuplicateKeyword(name));
        }
        self.entries.push((name, value.into()));
        Ok(())
    }

    /// Value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// `true` if `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Number of keyword arguments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if there are no keyword arguments.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<K, V> TryFrom<Vec<(K, V)>> for Keywords
where
    K: Into<String>,
    V: Into<Value>,
{
    type Error = HandleError;

    fn try_from(pairs: Vec<(K, V)>) -> HandleResult<Self> {
        let mut keywords = Keywords::new();
        for (k, v) in pairs {
            keywords.insert(k, v)?;
        }
        Ok(keywords)
    }
}

impl fmt::Debug for Keywords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Positional and keyword arguments as seen by the target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<Value>,
    keyword: Keywords,
}

impl Arguments {
    pub fn new(positional: Vec<Value>, keyword: Keywords) -> Self {
        Self { positional, keyword }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self) -> &Keywords {
        &self.keyword
    }

    /// Positional argument at `index`, or a host-style `TypeError`.
    pub fn arg(&self, index: usize) -> Result<&Value, CallError> {
        self.positional.get(index).ok_or_else(|| {
            CallError::new(
                "TypeError",
                format!(
                    "missing positional argument {index} ({} given)",
                    self.positional.len()
                ),
            )
        })
    }

    /// Keyword argument `name`, or a host-style `TypeError`.
    pub fn kwarg(&self, name: &str) -> Result<&Value, CallError> {
        self.keyword.get(name).ok_or_else(|| {
            CallError::new("TypeError", format!("missing required keyword argument '{name}'"))
        })
    }
}

/// A target plus everything needed to call it.
///
/// Immutable once built; shared read-only with the spawned thread.
pub struct Invocation {
    target: Arc<dyn Callable>,
    target_value: Value,
    name: String,
    arguments: Arguments,
}

impl Invocation {
    /// Capture a call. Fails with `InvalidTarget` unless `target` is callable.
    pub fn new(
        target: Value,
        name: impl Into<String>,
        positional: Vec<Value>,
        keyword: Keywords,
    ) -> HandleResult<Self> {
        let callable = match target.as_callable() {
            Some(c) => Arc::clone(c),
            None => {
                return Err(HandleError::InvalidTarget {
                    type_name: target.type_name(),
                })
            }
        };

        let name = name.into();
        if name.contains('\0') {
            return Err(HandleError::InvalidName(name));
        }

        Ok(Self {
            target: callable,
            target_value: target,
            name,
            arguments: Arguments::new(positional, keyword),
        })
    }

    /// Run `target(*positional, **keyword)` on the current thread.
    pub fn invoke(&self) -> Result<Value, CallError> {
        self.target.call(&self.arguments)
    }

    pub fn target(&self) -> &Value {
        &self.target_value
    }

    pub fn target_name(&self) -> &str {
        self.target.name()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn positional(&self) -> &[Value] {
        self.arguments.positional()
    }

    pub fn keyword(&self) -> &Keywords {
        self.arguments.keyword()
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("target", &self.target_value)
            .field("name", &self.name)
            .field("positional", &self.arguments.positional)
            .field("keyword", &self.arguments.keyword)
            .finish()
    }
}
