//! Value model shared by every accessor
//!
//! [`Value`] is the closed set of shapes an OTLP field can take. Getters
//! return one and setters pattern-match on the variant they expect, rejecting
//! anything else with [`Error::TypeMismatch`].

use opentelemetry_proto::tonic::common::v1::{
    any_value, AnyValue, ArrayValue, InstrumentationScope, KeyValue, KeyValueList,
};
use opentelemetry_proto::tonic::metrics::v1::{
    exponential_histogram_data_point::Buckets, summary_data_point::ValueAtQuantile, Exemplar,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{span, Status};

use crate::error::{Error, Result};

/// Any value readable from or writable to a telemetry field
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absent value
    #[default]
    Nil,
    Str(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
    /// Attribute collection, in wire order
    Map(Vec<KeyValue>),
    /// Array of attribute values
    Slice(Vec<AnyValue>),
    TraceId(TraceId),
    SpanId(SpanId),
    Events(Vec<span::Event>),
    Links(Vec<span::Link>),
    Status(Status),
    Exemplars(Vec<Exemplar>),
    Buckets(Buckets),
    QuantileValues(Vec<ValueAtQuantile>),
    Resource(Resource),
    Scope(InstrumentationScope),
}

impl Value {
    /// Short name of the variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::Map(_) => "map",
            Value::Slice(_) => "slice",
            Value::TraceId(_) => "trace id",
            Value::SpanId(_) => "span id",
            Value::Events(_) => "span events",
            Value::Links(_) => "span links",
            Value::Status(_) => "status",
            Value::Exemplars(_) => "exemplars",
            Value::Buckets(_) => "buckets",
            Value::QuantileValues(_) => "quantile values",
            Value::Resource(_) => "resource",
            Value::Scope(_) => "instrumentation scope",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub(crate) fn into_str(self, field: &str) -> Result<String> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(Error::type_mismatch(field, "string", &other)),
        }
    }

    pub(crate) fn into_int(self, field: &str) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(i),
            other => Err(Error::type_mismatch(field, "int", &other)),
        }
    }

    pub(crate) fn into_double(self, field: &str) -> Result<f64> {
        match self {
            Value::Double(d) => Ok(d),
            other => Err(Error::type_mismatch(field, "double", &other)),
        }
    }

    pub(crate) fn into_bool(self, field: &str) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(Error::type_mismatch(field, "bool", &other)),
        }
    }

    pub(crate) fn into_map(self, field: &str) -> Result<Vec<KeyValue>> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(Error::type_mismatch(field, "map", &other)),
        }
    }

    /// Convert into an OTLP attribute value.
    ///
    /// Only the scalar, map and slice variants have an attribute form; `Nil`
    /// becomes an empty attribute value.
    pub fn into_any_value(self, field: &str) -> Result<AnyValue> {
        let value = match self {
            Value::Nil => None,
            Value::Str(s) => Some(any_value::Value::StringValue(s)),
            Value::Bool(b) => Some(any_value::Value::BoolValue(b)),
            Value::Int(i) => Some(any_value::Value::IntValue(i)),
            Value::Double(d) => Some(any_value::Value::DoubleValue(d)),
            Value::Bytes(b) => Some(any_value::Value::BytesValue(b)),
            Value::Map(values) => Some(any_value::Value::KvlistValue(KeyValueList { values })),
            Value::Slice(values) => Some(any_value::Value::ArrayValue(ArrayValue { values })),
            other => return Err(Error::type_mismatch(field, "attribute value", &other)),
        };
        Ok(AnyValue { value })
    }

    /// Render scalars as text; composite values have no text form
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Nil => Some(String::new()),
            Value::Str(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Double(d) => Some(d.to_string()),
            Value::Bytes(b) => Some(const_hex::encode(b)),
            Value::TraceId(id) => Some(id.to_hex()),
            Value::SpanId(id) => Some(id.to_hex()),
            _ => None,
        }
    }
}

impl From<&AnyValue> for Value {
    fn from(av: &AnyValue) -> Self {
        match av.value.as_ref() {
            Some(any_value::Value::StringValue(s)) => Value::Str(s.clone()),
            Some(any_value::Value::BoolValue(b)) => Value::Bool(*b),
            Some(any_value::Value::IntValue(i)) => Value::Int(*i),
            Some(any_value::Value::DoubleValue(d)) => Value::Double(*d),
            Some(any_value::Value::ArrayValue(arr)) => Value::Slice(arr.values.clone()),
            Some(any_value::Value::KvlistValue(kvlist)) => Value::Map(kvlist.values.clone()),
            Some(any_value::Value::BytesValue(bytes)) => Value::Bytes(bytes.clone()),
            None => Value::Nil,
        }
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

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! fixed_width_id {
    ($(#[$meta:meta])* $name:ident, $width:expr, $field:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; $width]);

        impl $name {
            pub const WIDTH: usize = $width;

            /// The all-zero id, which OTLP treats as unset
            pub fn is_empty(&self) -> bool {
                self.0 == [0u8; $width]
            }

            /// Read from wire bytes; empty bytes are the unset id
            pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
                if bytes.is_empty() {
                    return Ok(Self::default());
                }
                let arr: [u8; $width] = bytes.try_into().map_err(|_| Error::Decode {
                    field: $field.to_string(),
                    reason: format!("ids must be {} bytes, got {}", $width, bytes.len()),
                })?;
                Ok(Self(arr))
            }

            /// Wire bytes; the unset id is stored as empty bytes
            pub fn to_vec(&self) -> Vec<u8> {
                if self.is_empty() {
                    Vec::new()
                } else {
                    self.0.to_vec()
                }
            }

            /// Store into wire bytes, leaving them untouched when they
            /// already decode to this id
            pub fn write_to(&self, bytes: &mut Vec<u8>) {
                if Self::from_bytes(bytes).ok() != Some(*self) {
                    *bytes = self.to_vec();
                }
            }

            /// Lowercase hex, or an empty string for the unset id
            pub fn to_hex(&self) -> String {
                if self.is_empty() {
                    String::new()
                } else {
                    const_hex::encode(self.0)
                }
            }

            /// Parse lowercase or uppercase hex of exactly the id width
            pub fn from_hex(hex: &str) -> Result<Self> {
                let bytes = const_hex::decode(hex).map_err(|e| Error::Decode {
                    field: $field.to_string(),
                    reason: e.to_string(),
                })?;
                if bytes.len() != $width {
                    return Err(Error::Decode {
                        field: $field.to_string(),
                        reason: format!("ids must be {} bytes, got {}", $width, bytes.len()),
                    });
                }
                Self::from_bytes(&bytes)
            }
        }
    };
}

fixed_width_id!(
    /// 16-byte trace identifier
    TraceId,
    16,
    "trace_id"
);

fixed_width_id!(
    /// 8-byte span identifier
    SpanId,
    8,
    "span_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_value_conversion_keeps_scalars() {
        let av = AnyValue {
            value: Some(any_value::Value::IntValue(200)),
        };
        assert_eq!(Value::from(&av), Value::Int(200));
        assert_eq!(Value::Int(200).into_any_value("x").unwrap(), av);
    }

    #[test]
    fn nil_becomes_empty_any_value() {
        let av = Value::Nil.into_any_value("x").unwrap();
        assert!(av.value.is_none());
        assert_eq!(Value::from(&av), Value::Nil);
    }

    #[test]
    fn identifiers_have_no_attribute_form() {
        let err = Value::TraceId(TraceId([1; 16]))
            .into_any_value("attributes[id]")
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { actual: "trace id", .. }));
    }

    #[test]
    fn trace_id_hex_round_trip() {
        let hex = "0af7651916cd43dd8448eb211c80319c";
        let id = TraceId::from_hex(hex).unwrap();
        assert_eq!(id.to_hex(), hex);
        assert_eq!(TraceId::from_hex("0AF7651916CD43DD8448EB211C80319C").unwrap(), id);
    }

    #[test]
    fn trace_id_rejects_wrong_width() {
        let err = TraceId::from_hex("0af7651916cd43dd8448eb211c8031").unwrap_err();
        assert!(matches!(err, Error::Decode { ref field, .. } if field == "trace_id"));
    }

    #[test]
    fn span_id_rejects_bad_hex() {
        assert!(SpanId::from_hex("zzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn unset_id_is_empty_on_the_wire() {
        let id = SpanId::from_bytes(&[]).unwrap();
        assert!(id.is_empty());
        assert!(id.to_vec().is_empty());
        assert_eq!(id.to_hex(), "");
    }

    #[test]
    fn empty_hex_is_a_wrong_width() {
        let err = SpanId::from_hex("").unwrap_err();
        assert!(matches!(err, Error::Decode { ref field, .. } if field == "span_id"));
        assert!(TraceId::from_hex("").is_err());
    }

    #[test]
    fn write_to_keeps_equivalent_wire_bytes() {
        let mut zeros = vec![0u8; 16];
        TraceId::default().write_to(&mut zeros);
        assert_eq!(zeros, vec![0u8; 16]);

        let mut empty = Vec::new();
        TraceId::default().write_to(&mut empty);
        assert!(empty.is_empty());

        let mut bytes = vec![0u8; 16];
        TraceId([7; 16]).write_to(&mut bytes);
        assert_eq!(bytes, vec![7u8; 16]);
    }

    #[test]
    fn to_text_skips_composites() {
        assert_eq!(Value::Int(3).to_text().as_deref(), Some("3"));
        assert_eq!(Value::Bytes(vec![0xab]).to_text().as_deref(), Some("ab"));
        assert_eq!(Value::Map(vec![]).to_text(), None);
    }
}
