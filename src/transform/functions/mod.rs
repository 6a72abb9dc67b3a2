//! Statement function library
//!
//! Editors mutate the record through a path argument and return `Nil`.
//! Converters compute a value and may only appear as arguments.

mod core;
mod helpers;

use std::collections::{HashMap, VecDeque};

use regex::Regex;

use super::accessor::{ContextKind, GetSetter, Getter, Literal};
use crate::error::{Error, Result};
use crate::value::Value;

pub use self::core::{
    DeleteKey, DeleteMatchingKeys, KeepKeys, Limit, ReplaceAllPatterns, ReplacePattern, Set,
    TruncateAll,
};
pub use helpers::{Concat, Int, SpanIdFn, TraceIdFn};

/// Positional parameter of a function signature
#[derive(Clone, Copy, Debug)]
pub struct Parameter {
    pub keyword: &'static str,
    pub required: bool,
    /// Absorbs every remaining argument; only valid last
    pub variadic: bool,
}

impl Parameter {
    pub const fn required(keyword: &'static str) -> Self {
        Self {
            keyword,
            required: true,
            variadic: false,
        }
    }

    pub const fn variadic(keyword: &'static str) -> Self {
        Self {
            keyword,
            required: false,
            variadic: true,
        }
    }
}

/// Runtime body of an editor
pub trait Expression<K: ContextKind>: Send + Sync {
    fn resolve(&self, ctx: &mut K::Context<'_>) -> Result<Value>;
}

/// Output of [`Function::compile`]
pub enum Compiled<K: ContextKind> {
    Editor(Box<dyn Expression<K>>),
    Converter(Box<dyn Getter<K>>),
}

/// A named function that binds its arguments once and runs per record
pub trait Function<K: ContextKind>: Send + Sync {
    fn identifier(&self) -> &'static str;

    fn parameters(&self) -> &'static [Parameter];

    fn compile(&self, arguments: ArgumentList<K>) -> Result<Compiled<K>>;
}

/// An argument after path, enum and nested-call resolution
pub enum BoundArgument<K: ContextKind> {
    Literal(Value),
    Path(Box<dyn GetSetter<K>>),
    Converter(Box<dyn Getter<K>>),
}

impl<K: ContextKind> BoundArgument<K> {
    pub fn into_getter(self) -> Box<dyn Getter<K>> {
        match self {
            BoundArgument::Literal(value) => Box::new(Literal(value)),
            BoundArgument::Path(path) => Box::new(path),
            BoundArgument::Converter(getter) => getter,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            BoundArgument::Literal(_) => "literal",
            BoundArgument::Path(_) => "path",
            BoundArgument::Converter(_) => "converter",
        }
    }
}

/// Arguments handed to a function in call order
pub struct ArgumentList<K: ContextKind> {
    function: &'static str,
    arguments: VecDeque<BoundArgument<K>>,
}

impl<K: ContextKind> ArgumentList<K> {
    /// Check `arguments` against the function's signature
    pub fn new(function: &dyn Function<K>, arguments: Vec<BoundArgument<K>>) -> Result<Self> {
        let name = function.identifier();
        let params = function.parameters();
        let required = params.iter().filter(|p| p.required).count();
        let variadic = params.last().is_some_and(|p| p.variadic);
        let given = arguments.len();
        if given < required || (!variadic && given > params.len()) {
            let expected = if variadic {
                format!("at least {required}")
            } else {
                params.len().to_string()
            };
            return Err(Error::invalid_arguments(
                name,
                format!("expected {expected} arguments, got {given}"),
            ));
        }
        Ok(Self {
            function: name,
            arguments: arguments.into(),
        })
    }

    pub fn function(&self) -> &'static str {
        self.function
    }

    pub fn required(&mut self, keyword: &str) -> Result<BoundArgument<K>> {
        self.arguments
            .pop_front()
            .ok_or_else(|| Error::invalid_arguments(self.function, format!("missing {keyword}")))
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// Every argument not yet consumed
    pub fn variadic(&mut self) -> Vec<BoundArgument<K>> {
        self.arguments.drain(..).collect()
    }

    /// Argument that must be a writable path
    pub fn required_target(&mut self, keyword: &str) -> Result<Box<dyn GetSetter<K>>> {
        match self.required(keyword)? {
            BoundArgument::Path(path) => Ok(path),
            other => Err(Error::invalid_arguments(
                self.function,
                format!("{keyword} must be a path, got {}", other.describe()),
            )),
        }
    }

    pub fn required_getter(&mut self, keyword: &str) -> Result<Box<dyn Getter<K>>> {
        Ok(self.required(keyword)?.into_getter())
    }

    /// Argument that must be known at bind time
    pub fn required_literal(&mut self, keyword: &str) -> Result<Value> {
        match self.required(keyword)? {
            BoundArgument::Literal(value) => Ok(value),
            other => Err(Error::invalid_arguments(
                self.function,
                format!("{keyword} must be a literal, got {}", other.describe()),
            )),
        }
    }

    pub fn required_string(&mut self, keyword: &str) -> Result<String> {
        match self.required_literal(keyword)? {
            Value::Str(s) => Ok(s),
            other => Err(Error::invalid_arguments(
                self.function,
                format!("{keyword} must be a string, got {}", other.kind_name()),
            )),
        }
    }

    pub fn required_int(&mut self, keyword: &str) -> Result<i64> {
        match self.required_literal(keyword)? {
            Value::Int(i) => Ok(i),
            other => Err(Error::invalid_arguments(
                self.function,
                format!("{keyword} must be an int, got {}", other.kind_name()),
            )),
        }
    }

    pub fn required_regex(&mut self, keyword: &str) -> Result<Regex> {
        let pattern = self.required_string(keyword)?;
        Regex::new(&pattern).map_err(|e| {
            Error::invalid_arguments(self.function, format!("{keyword} is not a valid regex: {e}"))
        })
    }
}

/// Function library visible to the binder for one context kind
pub struct Functions<K: ContextKind> {
    functions: HashMap<&'static str, Box<dyn Function<K>>>,
}

impl<K: ContextKind> Functions<K> {
    /// Empty library
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Every built-in editor and converter
    pub fn standard() -> Self {
        let mut functions = Self::new();
        for function in all::<K>() {
            functions.functions.insert(function.identifier(), function);
        }
        functions
    }

    /// Add or replace a function under its identifier
    pub fn register(&mut self, function: impl Function<K> + 'static) -> &mut Self {
        self.functions
            .insert(function.identifier(), Box::new(function));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Function<K>> {
        self.functions.get(name).map(|f| f.as_ref())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl<K: ContextKind> Default for Functions<K> {
    fn default() -> Self {
        Self::standard()
    }
}

/// Get all built-in functions
pub fn all<K: ContextKind>() -> Vec<Box<dyn Function<K>>> {
    vec![
        // Editors
        Box::new(Set),
        Box::new(DeleteKey),
        Box::new(DeleteMatchingKeys),
        Box::new(KeepKeys),
        Box::new(TruncateAll),
        Box::new(Limit),
        Box::new(ReplacePattern),
        Box::new(ReplaceAllPatterns),
        // Converters
        Box::new(Concat),
        Box::new(Int),
        Box::new(TraceIdFn),
        Box::new(SpanIdFn),
    ]
}
