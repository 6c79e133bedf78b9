//! Host value model.
//!
//! A handle does not know the host's object model; it only needs to carry
//! argument values across the thread boundary and to recognise whether a
//! target has the callable capability. [`Value`] is that minimal model.

use std::fmt;
use std::sync::Arc;

use crate::errors::CallError;
use crate::invocation::Arguments;

/// The callable capability a target must have.
///
/// Implementations run on the spawned thread, so they must be `Send + Sync`.
pub trait Callable: Send + Sync {
    /// Invoke with the captured arguments.
    fn call(&self, args: &Arguments) -> Result<Value, CallError>;

    /// Descriptive name used in logs.
    fn name(&self) -> &str {
        "<callable>"
    }
}

impl<F> Callable for F
where
    F: Fn(&Arguments) -> Result<Value, CallError> + Send + Sync,
{
    fn call(&self, args: &Arguments) -> Result<Value, CallError> {
        self(args)
    }
}

/// A named native function.
pub struct Function<F> {
    name: String,
    body: F,
}

impl<F> Function<F>
where
    F: Fn(&Arguments) -> Result<Value, CallError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<F> Callable for Function<F>
where
    F: Fn(&Arguments) -> Result<Value, CallError> + Send + Sync,
{
    fn call(&self, args: &Arguments) -> Result<Value, CallError> {
        (self.body)(args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A value owned by the host.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Value>),
    Callable(Arc<dyn Callable>),
}

impl Value {
    /// Wrap a closure as a callable value.
    pub fn function<F>(body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Value::Callable(Arc::new(body))
    }

    /// Wrap a closure as a named callable value.
    pub fn named_function<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Value::Callable(Arc::new(Function::new(name, body)))
    }

    /// `true` for `Value::Callable`.
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Callable(_))
    }

    /// The callable capability, if any.
    pub fn as_callable(&self) -> Option<&Arc<dyn Callable>> {
        match self {
            Value::Callable(c) => Some(c),
            _ => None,
        }
    }

    /// The integer, if this is `Value::Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The string, if this is `Value::Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Host type name, as reported in `InvalidTarget`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::Callable(_) => "callable",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            // Callables compare by identity
            (Value::Callable(a), Value::Callable(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Tuple(items) => {
                let mut t = f.debug_tuple("");
                for item in items {
                    t.field(item);
                }
                t.finish()
            }
            Value::Callable(c) => write!(f, "<callable {}>", c.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Tuple(items)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callable_capability() {
        let f = Value::function(|_| Ok(Value::None));
        assert!(f.is_callable());
        assert!(!Value::Int(3).is_callable());
        assert!(!Value::from("print").is_callable());
        assert_eq!(Value::None.type_name(), "NoneType");
    }

    #[test]
    fn test_callables_compare_by_identity() {
        let f = Value::function(|_| Ok(Value::None));
        let g = Value::function(|_| Ok(Value::None));

        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    #[test]
    fn test_named_function_debug() {
        let f = Value::named_function("_func", |_| Ok(Value::None));
        assert_eq!(format!("{f:?}"), "<callable _func>");
        assert_eq!(
            format!("{:?}", Value::Tuple(vec![Value::Int(69000), Value::Int(420)])),
            "(69000, 420)"
        );
    }
}
