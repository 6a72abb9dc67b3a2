//! Error types for path resolution, statement binding and execution

use thiserror::Error;

/// Errors raised while binding or executing transform statements
#[derive(Debug, Error)]
pub enum Error {
    /// First path segment is not in the context's field vocabulary
    #[error("invalid path expression, unrecognized field {0}")]
    UnrecognizedField(String),

    /// Recognized field used with a wrong, missing or extra sub-segment or map key
    #[error("invalid path expression {0}")]
    InvalidPath(String),

    /// Enum symbol absent from the context's symbol table
    #[error("enum symbol, {0}, not found")]
    UnknownEnumSymbol(String),

    /// A value could not be decoded into the field's storage (e.g. bad hex id)
    #[error("cannot decode {field}: {reason}")]
    Decode { field: String, reason: String },

    /// Setter received a value of the wrong kind
    #[error("type mismatch on {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Field can be read but not written
    #[error("field {0} is read-only")]
    ReadOnlyField(String),

    /// Invocation names a function missing from the function library
    #[error("undefined function {0}")]
    UnknownFunction(String),

    /// Function exists but its arguments do not fit its signature
    #[error("invalid arguments for {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    /// A statement failed while executing against one record
    #[error("statement {index} `{statement}` failed: {source}")]
    Statement {
        index: usize,
        statement: String,
        #[source]
        source: Box<Error>,
    },

    /// Payload is not a valid OTLP protobuf message
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// Processor configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn type_mismatch(
        field: impl Into<String>,
        expected: &'static str,
        actual: &crate::value::Value,
    ) -> Self {
        Error::TypeMismatch {
            field: field.into(),
            expected,
            actual: actual.kind_name(),
        }
    }

    pub(crate) fn invalid_arguments(function: &str, reason: impl Into<String>) -> Self {
        Error::InvalidArguments {
            function: function.to_string(),
            reason: reason.into(),
        }
    }

    /// Innermost error, unwrapping any statement diagnostics
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Statement { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
