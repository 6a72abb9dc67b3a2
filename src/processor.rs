//! Transform processor: binds configured statements once and applies them
//! to every span, data point and log record of an OTLP export request.

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::logs::v1::{ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::metrics::v1::{ResourceMetrics, ScopeMetrics};
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans};
use prost::Message;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::ParsedStatement;
use crate::contexts::datapoints::{self, data_point_count, DataPoints};
use crate::contexts::logs::{self, Logs};
use crate::contexts::traces::{self, Traces};
use crate::error::Result;
use crate::transform::{ContextKind, Functions, Parser, Statements};

/// What to do when a statement fails on one record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Return the error and stop processing the request
    #[default]
    Propagate,
    /// Log the error and continue with the next record
    Ignore,
}

/// Processor configuration
///
/// Statements are pre-parsed; see [`ParsedStatement`] for the JSON shape.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub error_mode: ErrorMode,
    /// Statements run against every span
    pub traces: Vec<ParsedStatement>,
    /// Statements run against every metric data point
    pub metrics: Vec<ParsedStatement>,
    /// Statements run against every log record
    pub logs: Vec<ParsedStatement>,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Bound statements for all three signals
pub struct TransformProcessor {
    error_mode: ErrorMode,
    traces: Statements<Traces>,
    metrics: Statements<DataPoints>,
    logs: Statements<Logs>,
}

impl TransformProcessor {
    /// Bind every configured statement with the standard function library.
    ///
    /// Fails on the first statement that does not bind.
    pub fn new(config: &Config) -> Result<Self> {
        let processor = Self {
            error_mode: config.error_mode,
            traces: bind(&config.traces)?,
            metrics: bind(&config.metrics)?,
            logs: bind(&config.logs)?,
        };
        debug!(
            error_mode = ?processor.error_mode,
            traces = processor.traces.len(),
            metrics = processor.metrics.len(),
            logs = processor.logs.len(),
            "transform processor ready"
        );
        Ok(processor)
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    /// Apply the trace statements to every span in place
    pub fn process_traces(&self, request: &mut ExportTraceServiceRequest) -> Result<()> {
        if self.traces.is_empty() {
            return Ok(());
        }
        let mut records = 0usize;
        for resource_spans in &mut request.resource_spans {
            let ResourceSpans {
                resource,
                scope_spans,
                ..
            } = resource_spans;
            with_ancestor(resource, |resource| {
                for scope_spans in scope_spans.iter_mut() {
                    let ScopeSpans { scope, spans, .. } = scope_spans;
                    with_ancestor(scope, |scope| {
                        for span in spans.iter_mut() {
                            let mut ctx = traces::TransformContext::new(span, scope, resource);
                            self.handle::<Traces>(self.traces.execute(&mut ctx))?;
                            records += 1;
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }
        debug!(records, "processed spans");
        Ok(())
    }

    /// Apply the metric statements to every data point of every metric type
    pub fn process_metrics(&self, request: &mut ExportMetricsServiceRequest) -> Result<()> {
        if self.metrics.is_empty() {
            return Ok(());
        }
        let mut records = 0usize;
        for resource_metrics in &mut request.resource_metrics {
            let ResourceMetrics {
                resource,
                scope_metrics,
                ..
            } = resource_metrics;
            with_ancestor(resource, |resource| {
                for scope_metrics in scope_metrics.iter_mut() {
                    let ScopeMetrics { scope, metrics, .. } = scope_metrics;
                    with_ancestor(scope, |scope| {
                        for metric in metrics.iter_mut() {
                            for index in 0..data_point_count(metric) {
                                let mut ctx =
                                    datapoints::TransformContext::new(metric, index, scope, resource);
                                self.handle::<DataPoints>(self.metrics.execute(&mut ctx))?;
                                records += 1;
                            }
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }
        debug!(records, "processed data points");
        Ok(())
    }

    /// Apply the log statements to every log record in place
    pub fn process_logs(&self, request: &mut ExportLogsServiceRequest) -> Result<()> {
        if self.logs.is_empty() {
            return Ok(());
        }
        let mut records = 0usize;
        for resource_logs in &mut request.resource_logs {
            let ResourceLogs {
                resource,
                scope_logs,
                ..
            } = resource_logs;
            with_ancestor(resource, |resource| {
                for scope_logs in scope_logs.iter_mut() {
                    let ScopeLogs {
                        scope, log_records, ..
                    } = scope_logs;
                    with_ancestor(scope, |scope| {
                        for log in log_records.iter_mut() {
                            let mut ctx = logs::TransformContext::new(log, scope, resource);
                            self.handle::<Logs>(self.logs.execute(&mut ctx))?;
                            records += 1;
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        }
        debug!(records, "processed log records");
        Ok(())
    }

    /// Decode a protobuf `ExportTraceServiceRequest`, process it, re-encode it
    pub fn process_traces_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut request = ExportTraceServiceRequest::decode(bytes)?;
        self.process_traces(&mut request)?;
        Ok(request.encode_to_vec())
    }

    /// Decode a protobuf `ExportMetricsServiceRequest`, process it, re-encode it
    pub fn process_metrics_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut request = ExportMetricsServiceRequest::decode(bytes)?;
        self.process_metrics(&mut request)?;
        Ok(request.encode_to_vec())
    }

    /// Decode a protobuf `ExportLogsServiceRequest`, process it, re-encode it
    pub fn process_logs_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let mut request = ExportLogsServiceRequest::decode(bytes)?;
        self.process_logs(&mut request)?;
        Ok(request.encode_to_vec())
    }

    fn handle<K: ContextKind>(&self, result: Result<()>) -> Result<()> {
        match (result, self.error_mode) {
            (Ok(()), _) => Ok(()),
            (Err(e), ErrorMode::Propagate) => Err(e),
            (Err(e), ErrorMode::Ignore) => {
                warn!(context = K::NAME, error = %e, "failed to process record, continuing");
                Ok(())
            }
        }
    }
}

fn bind<K: ContextKind>(statements: &[ParsedStatement]) -> Result<Statements<K>> {
    let functions = Functions::<K>::standard();
    Parser::new(&functions).parse_statements(statements)
}

/// Run `f` against an optional ancestor (resource or scope), materializing a
/// default when absent. A materialized default that is still empty afterwards
/// is removed again so untouched requests encode unchanged.
fn with_ancestor<T: Default + PartialEq>(
    slot: &mut Option<T>,
    f: impl FnOnce(&mut T) -> Result<()>,
) -> Result<()> {
    let was_absent = slot.is_none();
    let result = f(slot.get_or_insert_with(T::default));
    if was_absent && slot.as_ref().is_some_and(|v| *v == T::default()) {
        *slot = None;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Argument, Path};
    use crate::error::Error;
    use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
    use opentelemetry_proto::tonic::logs::v1::LogRecord;
    use opentelemetry_proto::tonic::metrics::v1::{
        metric::Data, Gauge, Histogram, HistogramDataPoint, Metric, NumberDataPoint,
    };
    use opentelemetry_proto::tonic::resource::v1::Resource;
    use opentelemetry_proto::tonic::trace::v1::Span;

    fn span(name: &str) -> Span {
        Span {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn trace_request(spans: Vec<Span>) -> ExportTraceServiceRequest {
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                resource: None,
                scope_spans: vec![ScopeSpans {
                    scope: None,
                    spans,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    fn rename_to(name: &str) -> ParsedStatement {
        ParsedStatement::assign(Path::field("name"), Argument::string(name))
    }

    #[test]
    fn test_processor_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TransformProcessor>();
    }

    #[test]
    fn test_config_from_json() {
        let config = Config::from_json(
            r#"{
                "error_mode": "ignore",
                "logs": [{
                    "invocation": {
                        "function": "set",
                        "arguments": [
                            {"path": {"fields": [{"name": "severity_text"}]}},
                            {"string": "WARN"}
                        ]
                    }
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.error_mode, ErrorMode::Ignore);
        assert_eq!(config.logs.len(), 1);
        assert!(config.traces.is_empty());
    }

    #[test]
    fn test_config_rejects_unknown_keys() {
        let err = Config::from_json(r#"{"statements": []}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_binding_errors_surface_at_construction() {
        let config = Config {
            traces: vec![ParsedStatement::assign(
                Path::field("severity_text"),
                Argument::string("x"),
            )],
            ..Default::default()
        };
        let err = TransformProcessor::new(&config).err().unwrap();
        assert!(matches!(err, Error::UnrecognizedField(ref f) if f == "severity_text"));
    }

    #[test]
    fn test_process_traces_renames_every_span() {
        let processor = TransformProcessor::new(&Config {
            traces: vec![rename_to("renamed")],
            ..Default::default()
        })
        .unwrap();
        let mut request = trace_request(vec![span("a"), span("b")]);
        processor.process_traces(&mut request).unwrap();
        let spans = &request.resource_spans[0].scope_spans[0].spans;
        assert!(spans.iter().all(|s| s.name == "renamed"));
        // Untouched absent ancestors stay absent.
        assert!(request.resource_spans[0].resource.is_none());
        assert!(request.resource_spans[0].scope_spans[0].scope.is_none());
    }

    #[test]
    fn test_absent_resource_is_materialized_on_write() {
        let processor = TransformProcessor::new(&Config {
            traces: vec![ParsedStatement::assign(
                Path::field("resource").then_keyed("attributes", "env"),
                Argument::string("prod"),
            )],
            ..Default::default()
        })
        .unwrap();
        let mut request = trace_request(vec![span("a")]);
        processor.process_traces(&mut request).unwrap();
        let resource = request.resource_spans[0].resource.as_ref().unwrap();
        assert_eq!(resource.attributes.len(), 1);
    }

    #[test]
    fn test_propagate_stops_at_first_failure() {
        let processor = TransformProcessor::new(&Config {
            traces: vec![ParsedStatement::assign(
                Path::field("trace_id").then("string"),
                Argument::string("abc"),
            )],
            ..Default::default()
        })
        .unwrap();
        let mut request = trace_request(vec![span("a")]);
        let err = processor.process_traces(&mut request).unwrap_err();
        assert!(matches!(err, Error::Statement { index: 0, .. }));
        assert!(matches!(err.root_cause(), Error::Decode { .. }));
    }

    #[test]
    fn test_ignore_continues_with_next_record() {
        let processor = TransformProcessor::new(&Config {
            error_mode: ErrorMode::Ignore,
            traces: vec![
                // kind is an int, name a string
                ParsedStatement::assign(Path::field("name"), Argument::Path(Path::field("kind"))),
                rename_to("never"),
            ],
            ..Default::default()
        })
        .unwrap();
        let mut request = trace_request(vec![span("a"), span("b")]);
        processor.process_traces(&mut request).unwrap();
        let names: Vec<&str> = request.resource_spans[0].scope_spans[0]
            .spans
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_process_metrics_visits_every_point_type() {
        let processor = TransformProcessor::new(&Config {
            metrics: vec![ParsedStatement::assign(
                Path::keyed("attributes", "seen"),
                Argument::Bool(true),
            )],
            ..Default::default()
        })
        .unwrap();
        let mut request = ExportMetricsServiceRequest {
            resource_metrics: vec![ResourceMetrics {
                scope_metrics: vec![ScopeMetrics {
                    metrics: vec![
                        Metric {
                            name: "g".to_string(),
                            data: Some(Data::Gauge(Gauge {
                                data_points: vec![NumberDataPoint::default(); 2],
                            })),
                            ..Default::default()
                        },
                        Metric {
                            name: "h".to_string(),
                            data: Some(Data::Histogram(Histogram {
                                data_points: vec![HistogramDataPoint::default()],
                                aggregation_temporality: 2,
                            })),
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        processor.process_metrics(&mut request).unwrap();
        let metrics = &request.resource_metrics[0].scope_metrics[0].metrics;
        let Some(Data::Gauge(gauge)) = &metrics[0].data else {
            panic!("gauge expected");
        };
        assert!(gauge.data_points.iter().all(|p| p.attributes.len() == 1));
        let Some(Data::Histogram(histogram)) = &metrics[1].data else {
            panic!("histogram expected");
        };
        assert_eq!(histogram.data_points[0].attributes.len(), 1);
    }

    #[test]
    fn test_process_logs_bytes_round_trip() {
        let processor = TransformProcessor::new(&Config {
            logs: vec![ParsedStatement::assign(
                Path::field("body"),
                Argument::string("redacted"),
            )],
            ..Default::default()
        })
        .unwrap();
        let request = ExportLogsServiceRequest {
            resource_logs: vec![ResourceLogs {
                resource: Some(Resource {
                    attributes: vec![KeyValue {
                        key: "service.name".to_string(),
                        value: Some(AnyValue {
                            value: Some(any_value::Value::StringValue("api".to_string())),
                        }),
                    }],
                    ..Default::default()
                }),
                scope_logs: vec![ScopeLogs {
                    log_records: vec![LogRecord {
                        body: Some(AnyValue {
                            value: Some(any_value::Value::StringValue("password=1".to_string())),
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        let out = processor
            .process_logs_bytes(&request.encode_to_vec())
            .unwrap();
        let decoded = ExportLogsServiceRequest::decode(out.as_slice()).unwrap();
        let log = &decoded.resource_logs[0].scope_logs[0].log_records[0];
        assert_eq!(
            log.body,
            Some(AnyValue {
                value: Some(any_value::Value::StringValue("redacted".to_string()))
            })
        );
        assert_eq!(decoded.resource_logs[0].resource, request.resource_logs[0].resource);
    }

    #[test]
    fn test_invalid_payload_is_protobuf_error() {
        let processor = TransformProcessor::new(&Config::default()).unwrap();
        let err = processor.process_traces_bytes(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, Error::Protobuf(_)));
    }

    #[test]
    fn test_with_ancestor_keeps_present_defaults() {
        let mut slot = Some(Resource::default());
        with_ancestor(&mut slot, |_| Ok(())).unwrap();
        assert!(slot.is_some());
    }
}
