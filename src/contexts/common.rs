//! Pieces shared by every context kind: resource and scope accessors, map
//! entry helpers and table-driven path dispatch.

use std::collections::HashMap;

use opentelemetry_proto::tonic::common::v1::{InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;

use crate::ast::{Enum, EnumSymbol, Field, Path};
use crate::error::{Error, Result};
use crate::transform::{ContextKind, GetSetter, Getter, Setter};
use crate::value::Value;

// ============================================================================
// Ancestor capabilities
// ============================================================================

/// Context kinds whose records sit under a resource
pub trait ResourceContext: ContextKind {
    fn resource<'b>(ctx: &'b Self::Context<'_>) -> &'b Resource;
    fn resource_mut<'b>(ctx: &'b mut Self::Context<'_>) -> &'b mut Resource;
}

/// Context kinds whose records sit under an instrumentation scope
pub trait ScopeContext: ContextKind {
    fn scope<'b>(ctx: &'b Self::Context<'_>) -> &'b InstrumentationScope;
    fn scope_mut<'b>(ctx: &'b mut Self::Context<'_>) -> &'b mut InstrumentationScope;
}

// ============================================================================
// Table-driven dispatch
// ============================================================================

/// Resolves a full path whose first segment has already been matched
pub(crate) type PathResolver<K> = fn(&Path) -> Result<Box<dyn GetSetter<K>>>;

/// Look up `path[0]` in the kind's resolver table
pub(crate) fn resolve_path<K: ContextKind>(
    table: &HashMap<&'static str, PathResolver<K>>,
    path: &Path,
) -> Result<Box<dyn GetSetter<K>>> {
    let first = path
        .fields
        .first()
        .ok_or_else(|| Error::InvalidPath("empty path".to_string()))?;
    let resolver = table
        .get(first.name.as_str())
        .ok_or_else(|| Error::UnrecognizedField(first.name.clone()))?;
    resolver(path)
}

/// Look up a symbol in the kind's enum table
pub(crate) fn resolve_enum(
    table: &HashMap<&'static str, Enum>,
    symbol: &EnumSymbol,
) -> Result<Enum> {
    table
        .get(symbol.0.as_str())
        .copied()
        .ok_or_else(|| Error::UnknownEnumSymbol(symbol.0.clone()))
}

pub(crate) fn invalid_path(path: &Path) -> Error {
    Error::InvalidPath(path.to_string())
}

/// Single segment, no map key
pub(crate) fn leaf<K, F>(path: &Path, field: F) -> Result<Box<dyn GetSetter<K>>>
where
    K: ContextKind,
    F: GetSetter<K> + 'static,
{
    match path.fields.as_slice() {
        [Field { map_key: None, .. }] => Ok(Box::new(field)),
        _ => Err(invalid_path(path)),
    }
}

/// Single segment addressing a map: whole map without a key, one entry with a key
pub(crate) fn keyed<K, F>(
    path: &Path,
    whole: F,
    entry: impl FnOnce(String) -> F,
) -> Result<Box<dyn GetSetter<K>>>
where
    K: ContextKind,
    F: GetSetter<K> + 'static,
{
    match path.fields.as_slice() {
        [Field { map_key: None, .. }] => Ok(Box::new(whole)),
        [Field {
            map_key: Some(key), ..
        }] => Ok(Box::new(entry(key.clone()))),
        _ => Err(invalid_path(path)),
    }
}

/// Field with an optional second segment; `select` maps `path[1].name`
/// (or `None` when absent) to an accessor, returning `None` when the shape
/// is not allowed.
pub(crate) fn with_subfield<K, F>(
    path: &Path,
    select: impl FnOnce(Option<&str>) -> Option<F>,
) -> Result<Box<dyn GetSetter<K>>>
where
    K: ContextKind,
    F: GetSetter<K> + 'static,
{
    let sub = match path.fields.as_slice() {
        [Field { map_key: None, .. }] => None,
        [Field { map_key: None, .. }, Field {
            name, map_key: None, ..
        }] => Some(name.as_str()),
        _ => return Err(invalid_path(path)),
    };
    select(sub)
        .map(|field| Box::new(field) as Box<dyn GetSetter<K>>)
        .ok_or_else(|| invalid_path(path))
}

// ============================================================================
// Map entries
// ============================================================================

/// Value stored under `key`, or `Nil` when absent
pub fn get_map_value(attrs: &[KeyValue], key: &str) -> Value {
    attrs
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_ref())
        .map(Value::from)
        .unwrap_or(Value::Nil)
}

/// Upsert `key`: replaces the first matching entry or appends a new one
pub fn set_map_value(attrs: &mut Vec<KeyValue>, key: &str, value: Value, field: &str) -> Result<()> {
    let value = value.into_any_value(field)?;
    match attrs.iter_mut().find(|kv| kv.key == key) {
        Some(kv) => kv.value = Some(value),
        None => attrs.push(KeyValue {
            key: key.to_string(),
            value: Some(value),
        }),
    }
    Ok(())
}

// ============================================================================
// Resource
// ============================================================================

/// Resolve the segments after `resource`
pub(crate) fn resource_path<K: ResourceContext>(path: &Path) -> Result<Box<dyn GetSetter<K>>> {
    let field = match path.fields.as_slice() {
        [Field { map_key: None, .. }] => ResourceField::Whole,
        [Field { map_key: None, .. }, Field { name, map_key }] => {
            match (name.as_str(), map_key) {
                ("attributes", None) => ResourceField::Attributes,
                ("attributes", Some(key)) => ResourceField::Attribute(key.clone()),
                ("dropped_attributes_count", None) => ResourceField::DroppedAttributesCount,
                _ => return Err(invalid_path(path)),
            }
        }
        _ => return Err(invalid_path(path)),
    };
    Ok(Box::new(field))
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ResourceField {
    Whole,
    Attributes,
    Attribute(String),
    DroppedAttributesCount,
}

impl ResourceField {
    fn name(&self) -> &'static str {
        match self {
            ResourceField::Whole => "resource",
            ResourceField::Attributes | ResourceField::Attribute(_) => "resource.attributes",
            ResourceField::DroppedAttributesCount => "resource.dropped_attributes_count",
        }
    }
}

impl<K: ResourceContext> Getter<K> for ResourceField {
    fn get(&self, ctx: &K::Context<'_>) -> Result<Value> {
        let resource = K::resource(ctx);
        Ok(match self {
            ResourceField::Whole => Value::Resource(resource.clone()),
            ResourceField::Attributes => Value::Map(resource.attributes.clone()),
            ResourceField::Attribute(key) => get_map_value(&resource.attributes, key),
            ResourceField::DroppedAttributesCount => {
                Value::Int(resource.dropped_attributes_count as i64)
            }
        })
    }
}

impl<K: ResourceContext> Setter<K> for ResourceField {
    fn set(&self, ctx: &mut K::Context<'_>, value: Value) -> Result<()> {
        let field = self.name();
        let resource = K::resource_mut(ctx);
        match self {
            ResourceField::Whole => match value {
                Value::Resource(new) => *resource = new,
                other => return Err(Error::type_mismatch(field, "resource", &other)),
            },
            ResourceField::Attributes => resource.attributes = value.into_map(field)?,
            ResourceField::Attribute(key) => {
                set_map_value(&mut resource.attributes, key, value, field)?
            }
            ResourceField::DroppedAttributesCount => {
                resource.dropped_attributes_count = value.into_int(field)? as u32
            }
        }
        Ok(())
    }
}

// ============================================================================
// Instrumentation scope
// ============================================================================

/// Resolve the segments after `instrumentation_scope`
pub(crate) fn scope_path<K: ScopeContext>(path: &Path) -> Result<Box<dyn GetSetter<K>>> {
    let field = match path.fields.as_slice() {
        [Field { map_key: None, .. }] => ScopeField::Whole,
        [Field { map_key: None, .. }, Field { name, map_key }] => {
            match (name.as_str(), map_key) {
                ("name", None) => ScopeField::Name,
                ("version", None) => ScopeField::Version,
                ("attributes", None) => ScopeField::Attributes,
                ("attributes", Some(key)) => ScopeField::Attribute(key.clone()),
                ("dropped_attributes_count", None) => ScopeField::DroppedAttributesCount,
                _ => return Err(invalid_path(path)),
            }
        }
        _ => return Err(invalid_path(path)),
    };
    Ok(Box::new(field))
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ScopeField {
    Whole,
    Name,
    Version,
    Attributes,
    Attribute(String),
    DroppedAttributesCount,
}

impl ScopeField {
    fn name(&self) -> &'static str {
        match self {
            ScopeField::Whole => "instrumentation_scope",
            ScopeField::Name => "instrumentation_scope.name",
            ScopeField::Version => "instrumentation_scope.version",
            ScopeField::Attributes | ScopeField::Attribute(_) => {
                "instrumentation_scope.attributes"
            }
            ScopeField::DroppedAttributesCount => "instrumentation_scope.dropped_attributes_count",
        }
    }
}

impl<K: ScopeContext> Getter<K> for ScopeField {
    fn get(&self, ctx: &K::Context<'_>) -> Result<Value> {
        let scope = K::scope(ctx);
        Ok(match self {
            ScopeField::Whole => Value::Scope(scope.clone()),
            ScopeField::Name => Value::Str(scope.name.clone()),
            ScopeField::Version => Value::Str(scope.version.clone()),
            ScopeField::Attributes => Value::Map(scope.attributes.clone()),
            ScopeField::Attribute(key) => get_map_value(&scope.attributes, key),
            ScopeField::DroppedAttributesCount => Value::Int(scope.dropped_attributes_count as i64),
        })
    }
}

impl<K: ScopeContext> Setter<K> for ScopeField {
    fn set(&self, ctx: &mut K::Context<'_>, value: Value) -> Result<()> {
        let field = self.name();
        let scope = K::scope_mut(ctx);
        match self {
            ScopeField::Whole => match value {
                Value::Scope(new) => *scope = new,
                other => return Err(Error::type_mismatch(field, "instrumentation scope", &other)),
            },
            ScopeField::Name => scope.name = value.into_str(field)?,
            ScopeField::Version => scope.version = value.into_str(field)?,
            ScopeField::Attributes => scope.attributes = value.into_map(field)?,
            ScopeField::Attribute(key) => set_map_value(&mut scope.attributes, key, value, field)?,
            ScopeField::DroppedAttributesCount => {
                scope.dropped_attributes_count = value.into_int(field)? as u32
            }
        }
        Ok(())
    }
}
