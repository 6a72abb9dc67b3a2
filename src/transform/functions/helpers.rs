//! Converters: functions that compute a value from their arguments

use super::{ArgumentList, Compiled, Function, Parameter};
use crate::error::{Error, Result};
use crate::transform::accessor::{ContextKind, Getter};
use crate::value::{SpanId, TraceId, Value};

// --- Concat ---
/// Join the text form of every value with a delimiter
#[derive(Clone, Copy, Debug)]
pub struct Concat;

impl<K: ContextKind> Function<K> for Concat {
    fn identifier(&self) -> &'static str {
        "Concat"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[
            Parameter::required("delimiter"),
            Parameter::variadic("values"),
        ];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let delimiter = arguments.required_string("delimiter")?;
        let values = arguments
            .variadic()
            .into_iter()
            .map(|arg| arg.into_getter())
            .collect();
        Ok(Compiled::Converter(Box::new(ConcatFn { delimiter, values })))
    }
}

struct ConcatFn<K: ContextKind> {
    delimiter: String,
    values: Vec<Box<dyn Getter<K>>>,
}

impl<K: ContextKind> Getter<K> for ConcatFn<K> {
    fn get(&self, ctx: &K::Context<'_>) -> Result<Value> {
        let mut parts = Vec::with_capacity(self.values.len());
        for getter in &self.values {
            let value = getter.get(ctx)?;
            let text = value
                .to_text()
                .ok_or_else(|| Error::type_mismatch("Concat", "scalar", &value))?;
            parts.push(text);
        }
        Ok(Value::Str(parts.join(&self.delimiter)))
    }
}

// --- Int ---
/// Convert a string, double or bool to an int; anything else is `Nil`
#[derive(Clone, Copy, Debug)]
pub struct Int;

impl<K: ContextKind> Function<K> for Int {
    fn identifier(&self) -> &'static str {
        "Int"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[Parameter::required("value")];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let value = arguments.required_getter("value")?;
        Ok(Compiled::Converter(Box::new(IntFn { value })))
    }
}

struct IntFn<K: ContextKind> {
    value: Box<dyn Getter<K>>,
}

fn to_int(value: Value) -> Value {
    match value {
        Value::Int(i) => Value::Int(i),
        Value::Double(f) => {
            // i64::MAX (9223372036854775807) cannot be exactly represented as f64;
            // it rounds to 9223372036854775808.0. Use the largest safe f64 value.
            const MAX_SAFE_FLOAT: f64 = 9_223_372_036_854_774_784.0;
            const MIN_SAFE_FLOAT: f64 = i64::MIN as f64;
            if f.is_finite() && (MIN_SAFE_FLOAT..=MAX_SAFE_FLOAT).contains(&f) {
                Value::Int(f as i64)
            } else {
                Value::Nil
            }
        }
        Value::Bool(b) => Value::Int(i64::from(b)),
        Value::Str(s) => s.trim().parse::<i64>().map_or(Value::Nil, Value::Int),
        _ => Value::Nil,
    }
}

impl<K: ContextKind> Getter<K> for IntFn<K> {
    fn get(&self, ctx: &K::Context<'_>) -> Result<Value> {
        Ok(to_int(self.value.get(ctx)?))
    }
}

// --- TraceID / SpanID ---

macro_rules! id_converter {
    ($(#[$meta:meta])* $name:ident, $expr_name:ident, $ident:expr, $id:ident, $variant:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug)]
        pub struct $name;

        impl<K: ContextKind> Function<K> for $name {
            fn identifier(&self) -> &'static str {
                $ident
            }

            fn parameters(&self) -> &'static [Parameter] {
                const PARAMETERS: &[Parameter] = &[Parameter::required("bytes")];
                PARAMETERS
            }

            fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
                let bytes = arguments.required_getter("bytes")?;
                Ok(Compiled::Converter(Box::new($expr_name { bytes })))
            }
        }

        struct $expr_name<K: ContextKind> {
            bytes: Box<dyn Getter<K>>,
        }

        impl<K: ContextKind> Getter<K> for $expr_name<K> {
            fn get(&self, ctx: &K::Context<'_>) -> Result<Value> {
                match self.bytes.get(ctx)? {
                    Value::Bytes(bytes) if bytes.len() == $id::WIDTH => {
                        Ok(Value::$variant($id::from_bytes(&bytes)?))
                    }
                    Value::Bytes(bytes) => Err(Error::invalid_arguments(
                        $ident,
                        format!("expected {} bytes, got {}", $id::WIDTH, bytes.len()),
                    )),
                    other => Err(Error::type_mismatch($ident, "bytes", &other)),
                }
            }
        }
    };
}

id_converter!(
    /// Build a trace id from exactly 16 bytes
    TraceIdFn,
    TraceIdExpr,
    "TraceID",
    TraceId,
    TraceId
);

id_converter!(
    /// Build a span id from exactly 8 bytes
    SpanIdFn,
    SpanIdExpr,
    "SpanID",
    SpanId,
    SpanId
);

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::transform::functions::BoundArgument;

    #[test]
    fn test_concat_joins_text_forms() {
        let ctx = context(&[("a", Value::from("x")), ("b", Value::Int(2))]);
        let concat = converter(
            &Concat,
            vec![
                literal("-"),
                target(Some("a")),
                target(Some("b")),
                literal(true),
            ],
        )
        .unwrap();
        assert_eq!(concat.get(&ctx).unwrap(), Value::from("x-2-true"));
    }

    #[test]
    fn test_concat_missing_key_is_empty_text() {
        let ctx = context(&[("a", Value::from("x"))]);
        let concat = converter(&Concat, vec![literal(","), target(Some("a")), target(Some("zz"))])
            .unwrap();
        assert_eq!(concat.get(&ctx).unwrap(), Value::from("x,"));
    }

    #[test]
    fn test_concat_rejects_maps() {
        let ctx = context(&[("a", Value::from("x"))]);
        let concat = converter(&Concat, vec![literal(","), target(None)]).unwrap();
        let err = concat.get(&ctx).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { actual: "map", .. }));
    }

    #[test]
    fn test_concat_delimiter_must_be_literal() {
        let err = converter(&Concat, vec![target(Some("a"))]).err().unwrap();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }

    #[test]
    fn test_int_conversions() {
        let ctx = context(&[]);
        for (input, expected) in [
            (Value::from(" 42 "), Value::Int(42)),
            (Value::Double(3.9), Value::Int(3)),
            (Value::Bool(true), Value::Int(1)),
            (Value::Int(-7), Value::Int(-7)),
            (Value::from("nope"), Value::Nil),
            (Value::Double(f64::NAN), Value::Nil),
            (Value::Double(1e300), Value::Nil),
            (Value::Nil, Value::Nil),
        ] {
            let int = converter(&Int, vec![literal(input.clone())]).unwrap();
            assert_eq!(int.get(&ctx).unwrap(), expected, "Int({input:?})");
        }
    }

    #[test]
    fn test_int_reads_paths() {
        let ctx = context(&[("code", Value::from("404"))]);
        let int = converter(&Int, vec![target(Some("code"))]).unwrap();
        assert_eq!(int.get(&ctx).unwrap(), Value::Int(404));
    }

    #[test]
    fn test_trace_id_from_bytes() {
        let ctx = context(&[]);
        let bytes: Vec<u8> = (1..=16).collect();
        let id = converter(&TraceIdFn, vec![literal(Value::Bytes(bytes.clone()))]).unwrap();
        assert_eq!(
            id.get(&ctx).unwrap(),
            Value::TraceId(TraceId::from_bytes(&bytes).unwrap())
        );
    }

    #[test]
    fn test_span_id_rejects_wrong_width() {
        let ctx = context(&[]);
        let id = converter(&SpanIdFn, vec![literal(Value::Bytes(vec![1, 2, 3]))]).unwrap();
        let err = id.get(&ctx).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { ref function, .. } if function == "SpanID"));
    }

    #[test]
    fn test_converters_nest() {
        let ctx = context(&[("a", Value::from("1")), ("b", Value::from("2"))]);
        let inner = converter(&Concat, vec![literal(""), target(Some("a")), target(Some("b"))])
            .unwrap();
        let outer = converter(&Int, vec![BoundArgument::Converter(inner)]).unwrap();
        assert_eq!(outer.get(&ctx).unwrap(), Value::Int(12));
    }
}
