//! Builtin symbol table: the native functions scripts may call.
//!
//! The host populates a [`BuiltinTable`] before compiling; the compiler
//! resolves every call target against it by qualified name (`module.function`)
//! and checks arity and literal argument types. The table is read-only once
//! compilation starts (it is shared behind an `Arc`).

pub mod stdlib;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::dsl::error::ValueType;
use crate::dsl::value::Value;

pub use stdlib::{standard_library, OutputSink};

/// A native implementation.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, BuiltinError> + Send + Sync>;

/// Failure reported by a native implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BuiltinError {
    pub message: String,
}

impl BuiltinError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Number,
    /// A number with no fractional part; literals are checked at compile time.
    Integer,
    String,
}

impl ParamType {
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Integer, Value::Number(n)) => n.fract() == 0.0,
            (Self::String, Value::Str(_)) => true,
            _ => false,
        }
    }

    pub fn expected(self) -> Option<ValueType> {
        match self {
            Self::Any => None,
            Self::Number => Some(ValueType::Number),
            Self::Integer => Some(ValueType::Integer),
            Self::String => Some(ValueType::String),
        }
    }
}

/// How a builtin may be run from the input-event thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Fast and non-blocking; safe to run inline.
    #[default]
    Sync,
    /// Performs blocking work (I/O, sleeps); units calling it run on the worker.
    Blocking,
}

/// Index of a symbol within its [`BuiltinTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinId(pub usize);

#[derive(Clone)]
pub struct BuiltinSymbol {
    pub name: String,
    pub params: Vec<ParamType>,
    pub mode: ExecMode,
    pub handle: NativeFn,
}

impl BuiltinSymbol {
    pub fn new<F>(name: impl Into<String>, params: Vec<ParamType>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, BuiltinError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params,
            mode: ExecMode::Sync,
            handle: Arc::new(f),
        }
    }

    /// Mark this builtin as blocking.
    pub fn blocking(mut self) -> Self {
        self.mode = ExecMode::Blocking;
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, BuiltinError> {
        (self.handle)(args)
    }
}

impl fmt::Debug for BuiltinSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinSymbol")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Name → symbol table.
#[derive(Debug, Clone, Default)]
pub struct BuiltinTable {
    symbols: Vec<BuiltinSymbol>,
    index: HashMap<String, BuiltinId>,
}

impl BuiltinTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous builtin taking `arity` untyped arguments.
    pub fn register<F>(&mut self, name: &str, arity: usize, f: F) -> BuiltinId
    where
        F: Fn(&[Value]) -> Result<Value, BuiltinError> + Send + Sync + 'static,
    {
        self.register_symbol(BuiltinSymbol::new(name, vec![ParamType::Any; arity], f))
    }

    /// Register a fully described symbol. Re-registering a name replaces it.
    pub fn register_symbol(&mut self, symbol: BuiltinSymbol) -> BuiltinId {
        if let Some(&id) = self.index.get(&symbol.name) {
            self.symbols[id.0] = symbol;
            return id;
        }
        let id = BuiltinId(self.symbols.len());
        self.index.insert(symbol.name.clone(), id);
        self.symbols.push(symbol);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<(BuiltinId, &BuiltinSymbol)> {
        let id = *self.index.get(name)?;
        self.symbols.get(id.0).map(|s| (id, s))
    }

    pub fn get(&self, id: BuiltinId) -> Option<&BuiltinSymbol> {
        self.symbols.get(id.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.symbols.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}
