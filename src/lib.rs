//! otlp-transform - Path-addressed edits for in-flight OTLP telemetry
//!
//! This crate binds pre-parsed transformation statements to one of three
//! context kinds (spans, metric data points, log records) and executes them
//! against OTLP records in place. Every statement reads and writes record
//! fields through symbolic paths such as `attributes["http.method"]`,
//! `resource.attributes["service.name"]` or `status.code`.
//!
//! # Design Principles
//!
//! - **No I/O**: Core never touches network or filesystem
//! - **No async**: Pure synchronous transforms
//! - **Bind once**: Paths, enum symbols and functions resolve before any record is touched
//! - **OTLP-native**: `opentelemetry-proto` request structs are the data model
//!
//! # High-level API
//!
//! ```ignore
//! use otlp_transform::{transform_traces, Config};
//!
//! let config = Config::from_json(config_json)?;
//! let out = transform_traces(otlp_bytes, &config)?;
//! ```
//!
//! # Lower-level API
//!
//! ```ignore
//! use otlp_transform::contexts::{traces, Traces};
//! use otlp_transform::{Functions, Parser};
//!
//! let functions = Functions::<Traces>::standard();
//! let statements = Parser::new(&functions).parse_statements(&parsed)?;
//! let mut ctx = traces::TransformContext::new(&mut span, &mut scope, &mut resource);
//! statements.execute(&mut ctx)?;
//! ```

pub mod ast;
pub mod contexts;
pub mod error;
pub mod processor;
pub mod transform;
pub mod value;

pub use ast::{Argument, CompareOp, Comparison, Enum, EnumSymbol, Field, Invocation, ParsedStatement, Path};
pub use contexts::{DataPoints, Logs, Traces};
pub use error::{Error, Result};
pub use processor::{Config, ErrorMode, TransformProcessor};
pub use transform::{
    Condition, ContextKind, Function, Functions, GetSetter, Getter, Literal, Parser, Setter,
    Statement, Statements,
};
pub use value::{SpanId, TraceId, Value};

// ============================================================================
// High-level API functions
// ============================================================================

/// Apply the configured trace statements to a protobuf `ExportTraceServiceRequest`.
///
/// Binds the configuration, decodes `bytes`, edits every span and returns the
/// re-encoded request. Build a [`TransformProcessor`] directly to bind once and
/// process many payloads.
pub fn transform_traces(bytes: &[u8], config: &Config) -> Result<Vec<u8>> {
    TransformProcessor::new(config)?.process_traces_bytes(bytes)
}

/// Apply the configured metric statements to a protobuf `ExportMetricsServiceRequest`.
pub fn transform_metrics(bytes: &[u8], config: &Config) -> Result<Vec<u8>> {
    TransformProcessor::new(config)?.process_metrics_bytes(bytes)
}

/// Apply the configured log statements to a protobuf `ExportLogsServiceRequest`.
pub fn transform_logs(bytes: &[u8], config: &Config) -> Result<Vec<u8>> {
    TransformProcessor::new(config)?.process_logs_bytes(bytes)
}
