//! Span transform context

use std::collections::HashMap;
use std::str::FromStr;

use once_cell::sync::Lazy;
use opentelemetry::trace::TraceState;
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{span::SpanKind, status::StatusCode, Span, Status};

use super::common::{
    get_map_value, keyed, leaf, resolve_enum, resolve_path, resource_path,
    scope_path, set_map_value, with_subfield, PathResolver, ResourceContext, ScopeContext,
};
use crate::ast::{Enum, EnumSymbol, Path};
use crate::error::{Error, Result};
use crate::transform::{ContextKind, GetSetter, Getter, Setter};
use crate::value::{SpanId, TraceId, Value};

/// One span together with the scope and resource it was emitted under
#[derive(Debug)]
pub struct TransformContext<'a> {
    span: &'a mut Span,
    scope: &'a mut InstrumentationScope,
    resource: &'a mut Resource,
}

impl<'a> TransformContext<'a> {
    pub fn new(
        span: &'a mut Span,
        scope: &'a mut InstrumentationScope,
        resource: &'a mut Resource,
    ) -> Self {
        Self {
            span,
            scope,
            resource,
        }
    }

    pub fn span(&self) -> &Span {
        self.span
    }

    pub fn scope(&self) -> &InstrumentationScope {
        self.scope
    }

    pub fn resource(&self) -> &Resource {
        self.resource
    }
}

/// Trace context kind
#[derive(Clone, Copy, Debug, Default)]
pub struct Traces;

impl ContextKind for Traces {
    type Context<'a> = TransformContext<'a>;

    const NAME: &'static str = "traces";

    fn parse_path(path: &Path) -> Result<Box<dyn GetSetter<Self>>> {
        resolve_path(&PATH_RESOLVERS, path)
    }

    fn parse_enum(symbol: &EnumSymbol) -> Result<Enum> {
        resolve_enum(&SYMBOL_TABLE, symbol)
    }
}

impl ResourceContext for Traces {
    fn resource<'b>(ctx: &'b TransformContext<'_>) -> &'b Resource {
        &*ctx.resource
    }

    fn resource_mut<'b>(ctx: &'b mut TransformContext<'_>) -> &'b mut Resource {
        &mut *ctx.resource
    }
}

impl ScopeContext for Traces {
    fn scope<'b>(ctx: &'b TransformContext<'_>) -> &'b InstrumentationScope {
        &*ctx.scope
    }

    fn scope_mut<'b>(ctx: &'b mut TransformContext<'_>) -> &'b mut InstrumentationScope {
        &mut *ctx.scope
    }
}

pub static SYMBOL_TABLE: Lazy<HashMap<&'static str, Enum>> = Lazy::new(|| {
    HashMap::from([
        ("SPAN_KIND_UNSPECIFIED", Enum(SpanKind::Unspecified as i64)),
        ("SPAN_KIND_INTERNAL", Enum(SpanKind::Internal as i64)),
        ("SPAN_KIND_SERVER", Enum(SpanKind::Server as i64)),
        ("SPAN_KIND_CLIENT", Enum(SpanKind::Client as i64)),
        ("SPAN_KIND_PRODUCER", Enum(SpanKind::Producer as i64)),
        ("SPAN_KIND_CONSUMER", Enum(SpanKind::Consumer as i64)),
        ("STATUS_CODE_UNSET", Enum(StatusCode::Unset as i64)),
        ("STATUS_CODE_OK", Enum(StatusCode::Ok as i64)),
        ("STATUS_CODE_ERROR", Enum(StatusCode::Error as i64)),
    ])
});

static PATH_RESOLVERS: Lazy<HashMap<&'static str, PathResolver<Traces>>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, PathResolver<Traces>> = HashMap::new();
    table.insert("resource", resource_path::<Traces>);
    table.insert("instrumentation_scope", scope_path::<Traces>);
    table.insert("trace_id", |p: &Path| {
        with_subfield(p, |sub| match sub {
            None => Some(SpanField::TraceId),
            Some("string") => Some(SpanField::TraceIdString),
            Some(_) => None,
        })
    });
    table.insert("span_id", |p: &Path| {
        with_subfield(p, |sub| match sub {
            None => Some(SpanField::SpanId),
            Some("string") => Some(SpanField::SpanIdString),
            Some(_) => None,
        })
    });
    table.insert("parent_span_id", |p: &Path| {
        with_subfield(p, |sub| match sub {
            None => Some(SpanField::ParentSpanId),
            Some("string") => Some(SpanField::ParentSpanIdString),
            Some(_) => None,
        })
    });
    table.insert("trace_state", |p: &Path| {
        keyed(p, SpanField::TraceState, SpanField::TraceStateKey)
    });
    table.insert("name", |p: &Path| leaf(p, SpanField::Name));
    table.insert("kind", |p: &Path| leaf(p, SpanField::Kind));
    table.insert("start_time_unix_nano", |p: &Path| {
        leaf(p, SpanField::StartTimeUnixNano)
    });
    table.insert("end_time_unix_nano", |p: &Path| {
        leaf(p, SpanField::EndTimeUnixNano)
    });
    table.insert("attributes", |p: &Path| {
        keyed(p, SpanField::Attributes, SpanField::Attribute)
    });
    table.insert("dropped_attributes_count", |p: &Path| {
        leaf(p, SpanField::DroppedAttributesCount)
    });
    table.insert("events", |p: &Path| leaf(p, SpanField::Events));
    table.insert("dropped_events_count", |p: &Path| {
        leaf(p, SpanField::DroppedEventsCount)
    });
    table.insert("links", |p: &Path| leaf(p, SpanField::Links));
    table.insert("dropped_links_count", |p: &Path| {
        leaf(p, SpanField::DroppedLinksCount)
    });
    table.insert("status", |p: &Path| {
        with_subfield(p, |sub| match sub {
            None => Some(SpanField::Status),
            Some("code") => Some(SpanField::StatusCode),
            Some("message") => Some(SpanField::StatusMessage),
            Some(_) => None,
        })
    });
    table
});

/// Addressable span fields
#[derive(Clone, Debug, PartialEq, Eq)]
enum SpanField {
    TraceId,
    TraceIdString,
    SpanId,
    SpanIdString,
    ParentSpanId,
    ParentSpanIdString,
    TraceState,
    TraceStateKey(String),
    Name,
    Kind,
    StartTimeUnixNano,
    EndTimeUnixNano,
    Attributes,
    Attribute(String),
    DroppedAttributesCount,
    Events,
    DroppedEventsCount,
    Links,
    DroppedLinksCount,
    Status,
    StatusCode,
    StatusMessage,
}

impl SpanField {
    fn name(&self) -> &'static str {
        match self {
            SpanField::TraceId => "trace_id",
            SpanField::TraceIdString => "trace_id.string",
            SpanField::SpanId => "span_id",
            SpanField::SpanIdString => "span_id.string",
            SpanField::ParentSpanId => "parent_span_id",
            SpanField::ParentSpanIdString => "parent_span_id.string",
            SpanField::TraceState | SpanField::TraceStateKey(_) => "trace_state",
            SpanField::Name => "name",
            SpanField::Kind => "kind",
            SpanField::StartTimeUnixNano => "start_time_unix_nano",
            SpanField::EndTimeUnixNano => "end_time_unix_nano",
            SpanField::Attributes | SpanField::Attribute(_) => "attributes",
            SpanField::DroppedAttributesCount => "dropped_attributes_count",
            SpanField::Events => "events",
            SpanField::DroppedEventsCount => "dropped_events_count",
            SpanField::Links => "links",
            SpanField::DroppedLinksCount => "dropped_links_count",
            SpanField::Status => "status",
            SpanField::StatusCode => "status.code",
            SpanField::StatusMessage => "status.message",
        }
    }
}

impl Getter<Traces> for SpanField {
    fn get(&self, ctx: &TransformContext<'_>) -> Result<Value> {
        let span: &Span = &*ctx.span;
        Ok(match self {
            SpanField::TraceId => Value::TraceId(TraceId::from_bytes(&span.trace_id)?),
            SpanField::TraceIdString => Value::Str(TraceId::from_bytes(&span.trace_id)?.to_hex()),
            SpanField::SpanId => Value::SpanId(SpanId::from_bytes(&span.span_id)?),
            SpanField::SpanIdString => Value::Str(SpanId::from_bytes(&span.span_id)?.to_hex()),
            SpanField::ParentSpanId => Value::SpanId(SpanId::from_bytes(&span.parent_span_id)?),
            SpanField::ParentSpanIdString => {
                Value::Str(SpanId::from_bytes(&span.parent_span_id)?.to_hex())
            }
            SpanField::TraceState => Value::Str(span.trace_state.clone()),
            // An unparsable tracestate reads as absent rather than failing the statement.
            SpanField::TraceStateKey(key) => parse_trace_state(&span.trace_state)
                .ok()
                .and_then(|ts| ts.get(key).map(|v| Value::Str(v.to_string())))
                .unwrap_or(Value::Nil),
            SpanField::Name => Value::Str(span.name.clone()),
            SpanField::Kind => Value::Int(span.kind as i64),
            SpanField::StartTimeUnixNano => Value::Int(span.start_time_unix_nano as i64),
            SpanField::EndTimeUnixNano => Value::Int(span.end_time_unix_nano as i64),
            SpanField::Attributes => Value::Map(span.attributes.clone()),
            SpanField::Attribute(key) => get_map_value(&span.attributes, key),
            SpanField::DroppedAttributesCount => Value::Int(span.dropped_attributes_count as i64),
            SpanField::Events => Value::Events(span.events.clone()),
            SpanField::DroppedEventsCount => Value::Int(span.dropped_events_count as i64),
            SpanField::Links => Value::Links(span.links.clone()),
            SpanField::DroppedLinksCount => Value::Int(span.dropped_links_count as i64),
            SpanField::Status => Value::Status(span.status.clone().unwrap_or_default()),
            SpanField::StatusCode => {
                Value::Int(span.status.as_ref().map_or(0, |s| s.code as i64))
            }
            SpanField::StatusMessage => Value::Str(
                span.status
                    .as_ref()
                    .map(|s| s.message.clone())
                    .unwrap_or_default(),
            ),
        })
    }
}

/// Parse a W3C tracestate header, tolerating optional whitespace around
/// list members and empty members
fn parse_trace_state(
    header: &str,
) -> std::result::Result<TraceState, opentelemetry::trace::TraceError> {
    let members: Vec<&str> = header
        .split(',')
        .map(|member| member.trim_matches(|c| c == ' ' || c == '\t'))
        .filter(|member| !member.is_empty())
        .collect();
    TraceState::from_str(&members.join(","))
}

impl Setter<Traces> for SpanField {
    fn set(&self, ctx: &mut TransformContext<'_>, value: Value) -> Result<()> {
        let field = self.name();
        let span: &mut Span = &mut *ctx.span;
        match self {
            SpanField::TraceId => match value {
                Value::TraceId(id) => id.write_to(&mut span.trace_id),
                other => return Err(Error::type_mismatch(field, "trace id", &other)),
            },
            SpanField::TraceIdString => {
                TraceId::from_hex(&value.into_str(field)?)?.write_to(&mut span.trace_id)
            }
            SpanField::SpanId => match value {
                Value::SpanId(id) => id.write_to(&mut span.span_id),
                other => return Err(Error::type_mismatch(field, "span id", &other)),
            },
            SpanField::SpanIdString => {
                SpanId::from_hex(&value.into_str(field)?)?.write_to(&mut span.span_id)
            }
            SpanField::ParentSpanId => match value {
                Value::SpanId(id) => id.write_to(&mut span.parent_span_id),
                other => return Err(Error::type_mismatch(field, "span id", &other)),
            },
            SpanField::ParentSpanIdString => {
                SpanId::from_hex(&value.into_str(field)?)?.write_to(&mut span.parent_span_id)
            }
            SpanField::TraceState => span.trace_state = value.into_str(field)?,
            SpanField::TraceStateKey(key) => {
                let member = value.into_str(field)?;
                let decode_err = |e: opentelemetry::trace::TraceError| Error::Decode {
                    field: field.to_string(),
                    reason: e.to_string(),
                };
                let updated = parse_trace_state(&span.trace_state)
                    .map_err(decode_err)?
                    .insert(key.clone(), member)
                    .map_err(decode_err)?;
                span.trace_state = updated.header();
            }
            SpanField::Name => span.name = value.into_str(field)?,
            SpanField::Kind => span.kind = value.into_int(field)? as i32,
            SpanField::StartTimeUnixNano => {
                span.start_time_unix_nano = value.into_int(field)? as u64
            }
            SpanField::EndTimeUnixNano => span.end_time_unix_nano = value.into_int(field)? as u64,
            SpanField::Attributes => span.attributes = value.into_map(field)?,
            SpanField::Attribute(key) => set_map_value(&mut span.attributes, key, value, field)?,
            SpanField::DroppedAttributesCount => {
                span.dropped_attributes_count = value.into_int(field)? as u32
            }
            SpanField::Events => match value {
                Value::Events(events) => {
                    span.events.clear();
                    span.events.extend(events);
                }
                other => return Err(Error::type_mismatch(field, "span events", &other)),
            },
            SpanField::DroppedEventsCount => {
                span.dropped_events_count = value.into_int(field)? as u32
            }
            SpanField::Links => match value {
                Value::Links(links) => {
                    span.links.clear();
                    span.links.extend(links);
                }
                other => return Err(Error::type_mismatch(field, "span links", &other)),
            },
            SpanField::DroppedLinksCount => {
                span.dropped_links_count = value.into_int(field)? as u32
            }
            SpanField::Status => match value {
                // An absent status reads as the default one; keep it absent.
                Value::Status(status) if span.status.is_none() && status == Status::default() => {}
                Value::Status(status) => span.status = Some(status),
                other => return Err(Error::type_mismatch(field, "status", &other)),
            },
            SpanField::StatusCode => {
                span.status.get_or_insert_with(Default::default).code =
                    value.into_int(field)? as i32
            }
            SpanField::StatusMessage => {
                span.status.get_or_insert_with(Default::default).message = value.into_str(field)?
            }
        }
        Ok(())
    }
}
