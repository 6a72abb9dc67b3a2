//! Parsed statement tree consumed by the binder
//!
//! These types are the output contract of the statement-language parser,
//! which lives outside this crate. They derive serde so pre-parsed statements
//! can be carried in processor configuration, and render back to statement
//! text for diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One segment of a path, optionally keyed into a map
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_key: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            map_key: None,
        }
    }

    pub fn keyed(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            map_key: Some(key.into()),
        }
    }
}

/// Symbolic address of a record field, e.g. `resource.attributes["k"]`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Path {
    pub fields: Vec<Field>,
}

impl Path {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Single-segment path
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(vec![Field::new(name)])
    }

    /// Single-segment path with a map key
    pub fn keyed(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(vec![Field::keyed(name, key)])
    }

    /// Append a segment
    pub fn then(mut self, name: impl Into<String>) -> Self {
        self.fields.push(Field::new(name));
        self
    }

    /// Append a keyed segment
    pub fn then_keyed(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.fields.push(Field::keyed(name, key));
        self
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&field.name)?;
            if let Some(key) = &field.map_key {
                write!(f, "[{key:?}]")?;
            }
        }
        Ok(())
    }
}

/// Unresolved enum token such as `SPAN_KIND_SERVER`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EnumSymbol(pub String);

impl EnumSymbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }
}

impl fmt::Display for EnumSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved enum value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Enum(pub i64);

/// Function call argument as written in the statement
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Argument {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Nil,
    Path(Path),
    Enum(EnumSymbol),
    Invocation(Invocation),
}

impl Argument {
    pub fn string(s: impl Into<String>) -> Self {
        Argument::String(s.into())
    }

    pub fn enum_symbol(symbol: impl Into<String>) -> Self {
        Argument::Enum(EnumSymbol::new(symbol))
    }
}

impl From<Path> for Argument {
    fn from(path: Path) -> Self {
        Argument::Path(path)
    }
}

impl From<Invocation> for Argument {
    fn from(invocation: Invocation) -> Self {
        Argument::Invocation(invocation)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::String(s) => write!(f, "{s:?}"),
            Argument::Int(i) => write!(f, "{i}"),
            Argument::Float(d) => write!(f, "{d:?}"),
            Argument::Bool(b) => write!(f, "{b}"),
            Argument::Bytes(b) => write!(f, "0x{}", const_hex::encode(b)),
            Argument::Nil => f.write_str("nil"),
            Argument::Path(p) => write!(f, "{p}"),
            Argument::Enum(e) => write!(f, "{e}"),
            Argument::Invocation(inv) => write!(f, "{inv}"),
        }
    }
}

/// A call to a named function
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Invocation {
    pub function: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

impl Invocation {
    pub fn new(function: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            function: function.into(),
            arguments,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        })
    }
}

/// `where` clause comparing two arguments
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Comparison {
    pub left: Argument,
    pub op: CompareOp,
    pub right: Argument,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

/// One statement as produced by the parser
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParsedStatement {
    pub invocation: Invocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Comparison>,
}

impl ParsedStatement {
    pub fn new(invocation: Invocation) -> Self {
        Self {
            invocation,
            condition: None,
        }
    }

    /// Plain assignment, modeled as `set(path, value)`
    pub fn assign(path: Path, value: Argument) -> Self {
        Self::new(Invocation::new("set", vec![Argument::Path(path), value]))
    }

    pub fn with_condition(mut self, left: Argument, op: CompareOp, right: Argument) -> Self {
        self.condition = Some(Comparison { left, op, right });
        self
    }
}

impl fmt::Display for ParsedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.invocation)?;
        if let Some(condition) = &self.condition {
            write!(f, " where {condition}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_statement_text() {
        let stmt = ParsedStatement::assign(
            Path::keyed("attributes", "http.status_code"),
            Argument::Int(404),
        )
        .with_condition(
            Argument::Path(Path::field("kind")),
            CompareOp::Eq,
            Argument::enum_symbol("SPAN_KIND_SERVER"),
        );
        assert_eq!(
            stmt.to_string(),
            r#"set(attributes["http.status_code"], 404) where kind == SPAN_KIND_SERVER"#
        );
    }

    #[test]
    fn renders_nested_paths() {
        let path = Path::field("resource").then_keyed("attributes", "service.name");
        assert_eq!(path.to_string(), r#"resource.attributes["service.name"]"#);
        assert_eq!(Path::field("trace_id").then("string").to_string(), "trace_id.string");
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{
            "invocation": {
                "function": "set",
                "arguments": [
                    {"path": {"fields": [{"name": "status"}, {"name": "code"}]}},
                    {"enum": "STATUS_CODE_ERROR"}
                ]
            },
            "condition": {
                "left": {"path": {"fields": [{"name": "name"}]}},
                "op": "!=",
                "right": "nil"
            }
        }"#;
        let stmt: ParsedStatement = serde_json::from_str(json).unwrap();
        assert_eq!(
            stmt.to_string(),
            "set(status.code, STATUS_CODE_ERROR) where name != nil"
        );
    }
}
