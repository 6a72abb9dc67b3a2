//! Getter/setter capabilities and the context-kind abstraction
//!
//! A context kind (traces, data points, logs) is a zero-sized marker that
//! names its per-record context type and knows how to resolve paths and enum
//! symbols for it. Accessors are generic over the kind rather than over the
//! context type so that compiled statements carry no borrow lifetime and can
//! be reused across every batch.

use crate::ast::{Enum, EnumSymbol, Path};
use crate::error::Result;
use crate::value::Value;

/// A family of transform contexts sharing one path vocabulary
pub trait ContextKind: Sized + Send + Sync + 'static {
    /// Per-record context, borrowing the record and its ancestors
    type Context<'a>;

    /// Short name used in logs
    const NAME: &'static str;

    /// Resolve a parsed path to an accessor for this kind's records
    fn parse_path(path: &Path) -> Result<Box<dyn GetSetter<Self>>>;

    /// Resolve an enum symbol from this kind's symbol table
    fn parse_enum(symbol: &EnumSymbol) -> Result<Enum>;
}

/// Reads one value out of a context
pub trait Getter<K: ContextKind>: Send + Sync {
    fn get(&self, ctx: &K::Context<'_>) -> Result<Value>;
}

/// Writes one value into a context
pub trait Setter<K: ContextKind>: Send + Sync {
    fn set(&self, ctx: &mut K::Context<'_>, value: Value) -> Result<()>;
}

/// Bound read/write capability for one resolved path
pub trait GetSetter<K: ContextKind>: Getter<K> + Setter<K> {}

impl<K: ContextKind, T: Getter<K> + Setter<K>> GetSetter<K> for T {}

impl<K: ContextKind> Getter<K> for Box<dyn GetSetter<K>> {
    fn get(&self, ctx: &K::Context<'_>) -> Result<Value> {
        (**self).get(ctx)
    }
}

impl<K: ContextKind> Setter<K> for Box<dyn GetSetter<K>> {
    fn set(&self, ctx: &mut K::Context<'_>, value: Value) -> Result<()> {
        (**self).set(ctx, value)
    }
}

/// Constant value bound at compile time
#[derive(Clone, Debug)]
pub struct Literal(pub Value);

impl<K: ContextKind> Getter<K> for Literal {
    fn get(&self, _ctx: &K::Context<'_>) -> Result<Value> {
        Ok(self.0.clone())
    }
}
