//! Log record transform context

use std::collections::HashMap;

use once_cell::sync::Lazy;
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::logs::v1::{LogRecord, SeverityNumber};
use opentelemetry_proto::tonic::resource::v1::Resource;

use super::common::{
    get_map_value, keyed, leaf, resolve_enum, resolve_path, resource_path, scope_path,
    set_map_value, with_subfield, PathResolver, ResourceContext, ScopeContext,
};
use crate::ast::{Enum, EnumSymbol, Path};
use crate::error::{Error, Result};
use crate::transform::{ContextKind, GetSetter, Getter, Setter};
use crate::value::{SpanId, TraceId, Value};

/// One log record together with its scope and resource
#[derive(Debug)]
pub struct TransformContext<'a> {
    log: &'a mut LogRecord,
    scope: &'a mut InstrumentationScope,
    resource: &'a mut Resource,
}

impl<'a> TransformContext<'a> {
    pub fn new(
        log: &'a mut LogRecord,
        scope: &'a mut InstrumentationScope,
        resource: &'a mut Resource,
    ) -> Self {
        Self {
            log,
            scope,
            resource,
        }
    }

    pub fn log_record(&self) -> &LogRecord {
        self.log
    }
}

/// Log context kind
#[derive(Clone, Copy, Debug, Default)]
pub struct Logs;

impl ContextKind for Logs {
    type Context<'a> = TransformContext<'a>;

    const NAME: &'static str = "logs";

    fn parse_path(path: &Path) -> Result<Box<dyn GetSetter<Self>>> {
        resolve_path(&PATH_RESOLVERS, path)
    }

    fn parse_enum(symbol: &EnumSymbol) -> Result<Enum> {
        resolve_enum(&SYMBOL_TABLE, symbol)
    }
}

impl ResourceContext for Logs {
    fn resource<'b>(ctx: &'b TransformContext<'_>) -> &'b Resource {
        &*ctx.resource
    }

    fn resource_mut<'b>(ctx: &'b mut TransformContext<'_>) -> &'b mut Resource {
        &mut *ctx.resource
    }
}

impl ScopeContext for Logs {
    fn scope<'b>(ctx: &'b TransformContext<'_>) -> &'b InstrumentationScope {
        &*ctx.scope
    }

    fn scope_mut<'b>(ctx: &'b mut TransformContext<'_>) -> &'b mut InstrumentationScope {
        &mut *ctx.scope
    }
}

pub static SYMBOL_TABLE: Lazy<HashMap<&'static str, Enum>> = Lazy::new(|| {
    [
        SeverityNumber::Unspecified,
        SeverityNumber::Trace,
        SeverityNumber::Trace2,
        SeverityNumber::Trace3,
        SeverityNumber::Trace4,
        SeverityNumber::Debug,
        SeverityNumber::Debug2,
        SeverityNumber::Debug3,
        SeverityNumber::Debug4,
        SeverityNumber::Info,
        SeverityNumber::Info2,
        SeverityNumber::Info3,
        SeverityNumber::Info4,
        SeverityNumber::Warn,
        SeverityNumber::Warn2,
        SeverityNumber::Warn3,
        SeverityNumber::Warn4,
        SeverityNumber::Error,
        SeverityNumber::Error2,
        SeverityNumber::Error3,
        SeverityNumber::Error4,
        SeverityNumber::Fatal,
        SeverityNumber::Fatal2,
        SeverityNumber::Fatal3,
        SeverityNumber::Fatal4,
    ]
    .into_iter()
    .map(|severity| (severity.as_str_name(), Enum(severity as i64)))
    .collect()
});

static PATH_RESOLVERS: Lazy<HashMap<&'static str, PathResolver<Logs>>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, PathResolver<Logs>> = HashMap::new();
    table.insert("resource", resource_path::<Logs>);
    table.insert("instrumentation_scope", scope_path::<Logs>);
    table.insert("time_unix_nano", |p: &Path| leaf(p, LogField::TimeUnixNano));
    table.insert("observed_time_unix_nano", |p: &Path| {
        leaf(p, LogField::ObservedTimeUnixNano)
    });
    table.insert("severity_number", |p: &Path| leaf(p, LogField::SeverityNumber));
    table.insert("severity_text", |p: &Path| leaf(p, LogField::SeverityText));
    table.insert("body", |p: &Path| leaf(p, LogField::Body));
    table.insert("attributes", |p: &Path| {
        keyed(p, LogField::Attributes, LogField::Attribute)
    });
    table.insert("dropped_attributes_count", |p: &Path| {
        leaf(p, LogField::DroppedAttributesCount)
    });
    table.insert("flags", |p: &Path| leaf(p, LogField::Flags));
    table.insert("trace_id", |p: &Path| {
        with_subfield(p, |sub| match sub {
            None => Some(LogField::TraceId),
            Some("string") => Some(LogField::TraceIdString),
            Some(_) => None,
        })
    });
    table.insert("span_id", |p: &Path| {
        with_subfield(p, |sub| match sub {
            None => Some(LogField::SpanId),
            Some("string") => Some(LogField::SpanIdString),
            Some(_) => None,
        })
    });
    table
});

#[derive(Clone, Debug, PartialEq, Eq)]
enum LogField {
    TimeUnixNano,
    ObservedTimeUnixNano,
    SeverityNumber,
    SeverityText,
    Body,
    Attributes,
    Attribute(String),
    DroppedAttributesCount,
    Flags,
    TraceId,
    TraceIdString,
    SpanId,
    SpanIdString,
}

impl LogField {
    fn name(&self) -> &'static str {
        match self {
            LogField::TimeUnixNano => "time_unix_nano",
            LogField::ObservedTimeUnixNano => "observed_time_unix_nano",
            LogField::SeverityNumber => "severity_number",
            LogField::SeverityText => "severity_text",
            LogField::Body => "body",
            LogField::Attributes | LogField::Attribute(_) => "attributes",
            LogField::DroppedAttributesCount => "dropped_attributes_count",
            LogField::Flags => "flags",
            LogField::TraceId => "trace_id",
            LogField::TraceIdString => "trace_id.string",
            LogField::SpanId => "span_id",
            LogField::SpanIdString => "span_id.string",
        }
    }
}

impl Getter<Logs> for LogField {
    fn get(&self, ctx: &TransformContext<'_>) -> Result<Value> {
        let log: &LogRecord = &*ctx.log;
        Ok(match self {
            LogField::TimeUnixNano => Value::Int(log.time_unix_nano as i64),
            LogField::ObservedTimeUnixNano => Value::Int(log.observed_time_unix_nano as i64),
            LogField::SeverityNumber => Value::Int(log.severity_number as i64),
            LogField::SeverityText => Value::Str(log.severity_text.clone()),
            LogField::Body => log.body.as_ref().map(Value::from).unwrap_or(Value::Nil),
            LogField::Attributes => Value::Map(log.attributes.clone()),
            LogField::Attribute(key) => get_map_value(&log.attributes, key),
            LogField::DroppedAttributesCount => Value::Int(log.dropped_attributes_count as i64),
            LogField::Flags => Value::Int(log.flags as i64),
            LogField::TraceId => Value::TraceId(TraceId::from_bytes(&log.trace_id)?),
            LogField::TraceIdString => Value::Str(TraceId::from_bytes(&log.trace_id)?.to_hex()),
            LogField::SpanId => Value::SpanId(SpanId::from_bytes(&log.span_id)?),
            LogField::SpanIdString => Value::Str(SpanId::from_bytes(&log.span_id)?.to_hex()),
        })
    }
}

impl Setter<Logs> for LogField {
    fn set(&self, ctx: &mut TransformContext<'_>, value: Value) -> Result<()> {
        let field = self.name();
        let log: &mut LogRecord = &mut *ctx.log;
        match self {
            LogField::TimeUnixNano => log.time_unix_nano = value.into_int(field)? as u64,
            LogField::ObservedTimeUnixNano => {
                log.observed_time_unix_nano = value.into_int(field)? as u64
            }
            LogField::SeverityNumber => log.severity_number = value.into_int(field)? as i32,
            LogField::SeverityText => log.severity_text = value.into_str(field)?,
            LogField::Body => log.body = Some(value.into_any_value(field)?),
            LogField::Attributes => log.attributes = value.into_map(field)?,
            LogField::Attribute(key) => set_map_value(&mut log.attributes, key, value, field)?,
            LogField::DroppedAttributesCount => {
                log.dropped_attributes_count = value.into_int(field)? as u32
            }
            LogField::Flags => log.flags = value.into_int(field)? as u32,
            LogField::TraceId => match value {
                Value::TraceId(id) => id.write_to(&mut log.trace_id),
                other => return Err(Error::type_mismatch(field, "trace id", &other)),
            },
            LogField::TraceIdString => {
                TraceId::from_hex(&value.into_str(field)?)?.write_to(&mut log.trace_id)
            }
            LogField::SpanId => match value {
                Value::SpanId(id) => id.write_to(&mut log.span_id),
                other => return Err(Error::type_mismatch(field, "span id", &other)),
            },
            LogField::SpanIdString => {
                SpanId::from_hex(&value.into_str(field)?)?.write_to(&mut log.span_id)
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};

    fn test_log() -> LogRecord {
        LogRecord {
            time_unix_nano: 1_700_000_000_000_000_000,
            severity_number: SeverityNumber::Info as i32,
            severity_text: "INFO".to_string(),
            body: Some(AnyValue {
                value: Some(any_value::Value::StringValue("hello".to_string())),
            }),
            attributes: vec![KeyValue {
                key: "user".to_string(),
                value: Some(AnyValue {
                    value: Some(any_value::Value::StringValue("alice".to_string())),
                }),
            }],
            ..Default::default()
        }
    }

    fn run<R>(log: &mut LogRecord, f: impl FnOnce(&mut TransformContext<'_>) -> R) -> R {
        let mut scope = InstrumentationScope::default();
        let mut resource = Resource::default();
        let mut ctx = TransformContext::new(log, &mut scope, &mut resource);
        f(&mut ctx)
    }

    fn get(log: &mut LogRecord, path: Path) -> Result<Value> {
        let accessor = Logs::parse_path(&path)?;
        run(log, |ctx| accessor.get(ctx))
    }

    fn set(log: &mut LogRecord, path: Path, value: Value) -> Result<()> {
        let accessor = Logs::parse_path(&path)?;
        run(log, |ctx| accessor.set(ctx, value))
    }

    #[test]
    fn resolves_every_top_level_field() {
        for name in [
            "resource",
            "instrumentation_scope",
            "time_unix_nano",
            "observed_time_unix_nano",
            "severity_number",
            "severity_text",
            "body",
            "attributes",
            "dropped_attributes_count",
            "flags",
            "trace_id",
            "span_id",
        ] {
            assert!(Logs::parse_path(&Path::field(name)).is_ok(), "{name}");
        }
        let err = Logs::parse_path(&Path::field("kind")).err().unwrap();
        assert!(matches!(err, Error::UnrecognizedField(ref f) if f == "kind"));
    }

    #[test]
    fn body_converts_through_any_value() {
        let mut log = test_log();
        assert_eq!(get(&mut log, Path::field("body")).unwrap(), Value::from("hello"));
        set(&mut log, Path::field("body"), Value::Int(7)).unwrap();
        assert_eq!(
            log.body,
            Some(AnyValue {
                value: Some(any_value::Value::IntValue(7))
            })
        );
    }

    #[test]
    fn missing_body_reads_nil() {
        let mut log = LogRecord::default();
        assert_eq!(get(&mut log, Path::field("body")).unwrap(), Value::Nil);
    }

    #[test]
    fn severity_round_trip() {
        let mut log = test_log();
        let error = Logs::parse_enum(&EnumSymbol::new("SEVERITY_NUMBER_ERROR")).unwrap();
        set(&mut log, Path::field("severity_number"), Value::Int(error.0)).unwrap();
        assert_eq!(log.severity_number, SeverityNumber::Error as i32);
        assert_eq!(
            get(&mut log, Path::field("severity_number")).unwrap(),
            Value::Int(17)
        );
    }

    #[test]
    fn severity_symbols_cover_every_level() {
        assert_eq!(SYMBOL_TABLE.len(), 25);
        assert_eq!(
            Logs::parse_enum(&EnumSymbol::new("SEVERITY_NUMBER_UNSPECIFIED")).unwrap(),
            Enum(0)
        );
        assert_eq!(
            Logs::parse_enum(&EnumSymbol::new("SEVERITY_NUMBER_FATAL4")).unwrap(),
            Enum(24)
        );
        assert!(Logs::parse_enum(&EnumSymbol::new("SPAN_KIND_SERVER")).is_err());
    }

    #[test]
    fn span_id_string_round_trip() {
        let mut log = test_log();
        let path = Path::field("span_id").then("string");
        set(&mut log, path.clone(), Value::from("0102030405060708")).unwrap();
        assert_eq!(get(&mut log, path).unwrap(), Value::from("0102030405060708"));
        assert_eq!(log.span_id, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn empty_trace_id_string_is_rejected() {
        let mut log = test_log();
        let path = Path::field("trace_id").then("string");
        set(&mut log, path.clone(), Value::from("0af7651916cd43dd8448eb211c80319c")).unwrap();
        let before = log.trace_id.clone();
        let err = set(&mut log, path, Value::from("")).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert_eq!(log.trace_id, before);
    }

    #[test]
    fn flags_reject_strings() {
        let mut log = test_log();
        let err = set(&mut log, Path::field("flags"), Value::from("1")).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: "int", .. }));
    }

    #[test]
    fn attribute_upsert() {
        let mut log = test_log();
        set(&mut log, Path::keyed("attributes", "user"), Value::from("bob")).unwrap();
        assert_eq!(log.attributes.len(), 1);
        assert_eq!(
            get(&mut log, Path::keyed("attributes", "user")).unwrap(),
            Value::from("bob")
        );
    }
}
