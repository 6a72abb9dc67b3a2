//! Metric data point transform context
//!
//! A data point is addressed as (metric, index) so that `metric.*` paths and
//! data point paths can both be served from one context. Every metric type is
//! visited; fields a point type does not carry read as `Nil` and writes to
//! them are dropped after the value kind has been checked.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, InstrumentationScope};
use opentelemetry_proto::tonic::metrics::v1::{
    exponential_histogram_data_point::Buckets, metric::Data, number_data_point,
    AggregationTemporality, DataPointFlags, ExponentialHistogramDataPoint, HistogramDataPoint,
    Metric, NumberDataPoint, SummaryDataPoint,
};
use opentelemetry_proto::tonic::resource::v1::Resource;

use super::common::{
    get_map_value, keyed, leaf, resolve_enum, resolve_path, resource_path, scope_path,
    set_map_value, with_subfield, PathResolver, ResourceContext, ScopeContext,
};
use crate::ast::{Enum, EnumSymbol, Path};
use crate::error::{Error, Result};
use crate::transform::{ContextKind, GetSetter, Getter, Setter};
use crate::value::Value;

pub const METRIC_DATA_TYPE_NONE: i64 = 0;
pub const METRIC_DATA_TYPE_GAUGE: i64 = 1;
pub const METRIC_DATA_TYPE_SUM: i64 = 2;
pub const METRIC_DATA_TYPE_HISTOGRAM: i64 = 3;
pub const METRIC_DATA_TYPE_EXPONENTIAL_HISTOGRAM: i64 = 4;
pub const METRIC_DATA_TYPE_SUMMARY: i64 = 5;

/// One data point of `metric`, with the metric's scope and resource
#[derive(Debug)]
pub struct TransformContext<'a> {
    metric: &'a mut Metric,
    index: usize,
    scope: &'a mut InstrumentationScope,
    resource: &'a mut Resource,
}

impl<'a> TransformContext<'a> {
    pub fn new(
        metric: &'a mut Metric,
        index: usize,
        scope: &'a mut InstrumentationScope,
        resource: &'a mut Resource,
    ) -> Self {
        Self {
            metric,
            index,
            scope,
            resource,
        }
    }

    pub fn metric(&self) -> &Metric {
        self.metric
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn point(&self) -> Option<DataPoint<'_>> {
        Some(match self.metric.data.as_ref()? {
            Data::Gauge(g) => DataPoint::Number(g.data_points.get(self.index)?),
            Data::Sum(s) => DataPoint::Number(s.data_points.get(self.index)?),
            Data::Histogram(h) => DataPoint::Histogram(h.data_points.get(self.index)?),
            Data::ExponentialHistogram(e) => {
                DataPoint::ExponentialHistogram(e.data_points.get(self.index)?)
            }
            Data::Summary(s) => DataPoint::Summary(s.data_points.get(self.index)?),
        })
    }

    fn point_mut(&mut self) -> Option<DataPointMut<'_>> {
        let index = self.index;
        Some(match self.metric.data.as_mut()? {
            Data::Gauge(g) => DataPointMut::Number(g.data_points.get_mut(index)?),
            Data::Sum(s) => DataPointMut::Number(s.data_points.get_mut(index)?),
            Data::Histogram(h) => DataPointMut::Histogram(h.data_points.get_mut(index)?),
            Data::ExponentialHistogram(e) => {
                DataPointMut::ExponentialHistogram(e.data_points.get_mut(index)?)
            }
            Data::Summary(s) => DataPointMut::Summary(s.data_points.get_mut(index)?),
        })
    }
}

/// Number of data points carried by a metric, whatever its type
pub fn data_point_count(metric: &Metric) -> usize {
    match &metric.data {
        None => 0,
        Some(Data::Gauge(g)) => g.data_points.len(),
        Some(Data::Sum(s)) => s.data_points.len(),
        Some(Data::Histogram(h)) => h.data_points.len(),
        Some(Data::ExponentialHistogram(e)) => e.data_points.len(),
        Some(Data::Summary(s)) => s.data_points.len(),
    }
}

fn metric_type(metric: &Metric) -> i64 {
    match &metric.data {
        None => METRIC_DATA_TYPE_NONE,
        Some(Data::Gauge(_)) => METRIC_DATA_TYPE_GAUGE,
        Some(Data::Sum(_)) => METRIC_DATA_TYPE_SUM,
        Some(Data::Histogram(_)) => METRIC_DATA_TYPE_HISTOGRAM,
        Some(Data::ExponentialHistogram(_)) => METRIC_DATA_TYPE_EXPONENTIAL_HISTOGRAM,
        Some(Data::Summary(_)) => METRIC_DATA_TYPE_SUMMARY,
    }
}

#[derive(Clone, Copy)]
enum DataPoint<'b> {
    Number(&'b NumberDataPoint),
    Histogram(&'b HistogramDataPoint),
    ExponentialHistogram(&'b ExponentialHistogramDataPoint),
    Summary(&'b SummaryDataPoint),
}

enum DataPointMut<'b> {
    Number(&'b mut NumberDataPoint),
    Histogram(&'b mut HistogramDataPoint),
    ExponentialHistogram(&'b mut ExponentialHistogramDataPoint),
    Summary(&'b mut SummaryDataPoint),
}

/// Evaluate `$body` against whichever point type `$point` holds
macro_rules! each_point {
    ($kind:ident, $point:expr, $p:ident => $body:expr) => {
        match $point {
            $kind::Number($p) => $body,
            $kind::Histogram($p) => $body,
            $kind::ExponentialHistogram($p) => $body,
            $kind::Summary($p) => $body,
        }
    };
}

/// Data point context kind
#[derive(Clone, Copy, Debug, Default)]
pub struct DataPoints;

impl ContextKind for DataPoints {
    type Context<'a> = TransformContext<'a>;

    const NAME: &'static str = "datapoints";

    fn parse_path(path: &Path) -> Result<Box<dyn GetSetter<Self>>> {
        resolve_path(&PATH_RESOLVERS, path)
    }

    fn parse_enum(symbol: &EnumSymbol) -> Result<Enum> {
        resolve_enum(&SYMBOL_TABLE, symbol)
    }
}

impl ResourceContext for DataPoints {
    fn resource<'b>(ctx: &'b TransformContext<'_>) -> &'b Resource {
        &*ctx.resource
    }

    fn resource_mut<'b>(ctx: &'b mut TransformContext<'_>) -> &'b mut Resource {
        &mut *ctx.resource
    }
}

impl ScopeContext for DataPoints {
    fn scope<'b>(ctx: &'b TransformContext<'_>) -> &'b InstrumentationScope {
        &*ctx.scope
    }

    fn scope_mut<'b>(ctx: &'b mut TransformContext<'_>) -> &'b mut InstrumentationScope {
        &mut *ctx.scope
    }
}

pub static SYMBOL_TABLE: Lazy<HashMap<&'static str, Enum>> = Lazy::new(|| {
    HashMap::from([
        (
            "AGGREGATION_TEMPORALITY_UNSPECIFIED",
            Enum(AggregationTemporality::Unspecified as i64),
        ),
        (
            "AGGREGATION_TEMPORALITY_DELTA",
            Enum(AggregationTemporality::Delta as i64),
        ),
        (
            "AGGREGATION_TEMPORALITY_CUMULATIVE",
            Enum(AggregationTemporality::Cumulative as i64),
        ),
        ("FLAG_NONE", Enum(0)),
        (
            "FLAG_NO_RECORDED_VALUE",
            Enum(DataPointFlags::NoRecordedValueMask as i64),
        ),
        ("METRIC_DATA_TYPE_NONE", Enum(METRIC_DATA_TYPE_NONE)),
        ("METRIC_DATA_TYPE_GAUGE", Enum(METRIC_DATA_TYPE_GAUGE)),
        ("METRIC_DATA_TYPE_SUM", Enum(METRIC_DATA_TYPE_SUM)),
        ("METRIC_DATA_TYPE_HISTOGRAM", Enum(METRIC_DATA_TYPE_HISTOGRAM)),
        (
            "METRIC_DATA_TYPE_EXPONENTIAL_HISTOGRAM",
            Enum(METRIC_DATA_TYPE_EXPONENTIAL_HISTOGRAM),
        ),
        ("METRIC_DATA_TYPE_SUMMARY", Enum(METRIC_DATA_TYPE_SUMMARY)),
    ])
});

static PATH_RESOLVERS: Lazy<HashMap<&'static str, PathResolver<DataPoints>>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, PathResolver<DataPoints>> = HashMap::new();
    table.insert("resource", resource_path::<DataPoints>);
    table.insert("instrumentation_scope", scope_path::<DataPoints>);
    table.insert("metric", |p: &Path| {
        with_subfield(p, |sub| match sub? {
            "name" => Some(MetricField::Name),
            "description" => Some(MetricField::Description),
            "unit" => Some(MetricField::Unit),
            "type" => Some(MetricField::Type),
            "aggregation_temporality" => Some(MetricField::AggregationTemporality),
            "is_monotonic" => Some(MetricField::IsMonotonic),
            _ => None,
        })
    });
    table.insert("attributes", |p: &Path| {
        keyed(p, PointField::Attributes, PointField::Attribute)
    });
    table.insert("start_time_unix_nano", |p: &Path| {
        leaf(p, PointField::StartTimeUnixNano)
    });
    table.insert("time_unix_nano", |p: &Path| leaf(p, PointField::TimeUnixNano));
    table.insert("value_double", |p: &Path| leaf(p, PointField::ValueDouble));
    table.insert("value_int", |p: &Path| leaf(p, PointField::ValueInt));
    table.insert("exemplars", |p: &Path| leaf(p, PointField::Exemplars));
    table.insert("flags", |p: &Path| leaf(p, PointField::Flags));
    table.insert("count", |p: &Path| leaf(p, PointField::Count));
    table.insert("sum", |p: &Path| leaf(p, PointField::Sum));
    table.insert("bucket_counts", |p: &Path| leaf(p, PointField::BucketCounts));
    table.insert("explicit_bounds", |p: &Path| leaf(p, PointField::ExplicitBounds));
    table.insert("scale", |p: &Path| leaf(p, PointField::Scale));
    table.insert("zero_count", |p: &Path| leaf(p, PointField::ZeroCount));
    table.insert("positive", |p: &Path| buckets_path(p, Side::Positive));
    table.insert("negative", |p: &Path| buckets_path(p, Side::Negative));
    table.insert("quantile_values", |p: &Path| leaf(p, PointField::QuantileValues));
    table
});

fn buckets_path(path: &Path, side: Side) -> Result<Box<dyn GetSetter<DataPoints>>> {
    with_subfield(path, |sub| {
        let part = match sub {
            None => BucketsPart::Whole,
            Some("offset") => BucketsPart::Offset,
            Some("bucket_counts") => BucketsPart::BucketCounts,
            Some(_) => return None,
        };
        Some(BucketsField { side, part })
    })
}

// ============================================================================
// Numeric list conversions
// ============================================================================

fn counts_to_value(counts: &[u64]) -> Value {
    Value::Slice(
        counts
            .iter()
            .map(|c| AnyValue {
                value: Some(any_value::Value::IntValue(*c as i64)),
            })
            .collect(),
    )
}

fn bounds_to_value(bounds: &[f64]) -> Value {
    Value::Slice(
        bounds
            .iter()
            .map(|b| AnyValue {
                value: Some(any_value::Value::DoubleValue(*b)),
            })
            .collect(),
    )
}

fn value_to_counts(value: Value, field: &str) -> Result<Vec<u64>> {
    match value {
        Value::Slice(items) => items
            .iter()
            .map(|item| Value::from(item).into_int(field).map(|c| c as u64))
            .collect(),
        other => Err(Error::type_mismatch(field, "slice", &other)),
    }
}

fn value_to_bounds(value: Value, field: &str) -> Result<Vec<f64>> {
    match value {
        Value::Slice(items) => items
            .iter()
            .map(|item| Value::from(item).into_double(field))
            .collect(),
        other => Err(Error::type_mismatch(field, "slice", &other)),
    }
}

fn replace_all<T>(dst: &mut Vec<T>, src: Vec<T>) {
    dst.clear();
    dst.extend(src);
}

// ============================================================================
// metric.*
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MetricField {
    Name,
    Description,
    Unit,
    Type,
    AggregationTemporality,
    IsMonotonic,
}

impl MetricField {
    fn name(&self) -> &'static str {
        match self {
            MetricField::Name => "metric.name",
            MetricField::Description => "metric.description",
            MetricField::Unit => "metric.unit",
            MetricField::Type => "metric.type",
            MetricField::AggregationTemporality => "metric.aggregation_temporality",
            MetricField::IsMonotonic => "metric.is_monotonic",
        }
    }
}

impl Getter<DataPoints> for MetricField {
    fn get(&self, ctx: &TransformContext<'_>) -> Result<Value> {
        let metric: &Metric = &*ctx.metric;
        Ok(match self {
            MetricField::Name => Value::Str(metric.name.clone()),
            MetricField::Description => Value::Str(metric.description.clone()),
            MetricField::Unit => Value::Str(metric.unit.clone()),
            MetricField::Type => Value::Int(metric_type(metric)),
            MetricField::AggregationTemporality => match &metric.data {
                Some(Data::Sum(s)) => Value::Int(s.aggregation_temporality as i64),
                Some(Data::Histogram(h)) => Value::Int(h.aggregation_temporality as i64),
                Some(Data::ExponentialHistogram(e)) => Value::Int(e.aggregation_temporality as i64),
                _ => Value::Nil,
            },
            MetricField::IsMonotonic => match &metric.data {
                Some(Data::Sum(s)) => Value::Bool(s.is_monotonic),
                _ => Value::Nil,
            },
        })
    }
}

impl Setter<DataPoints> for MetricField {
    fn set(&self, ctx: &mut TransformContext<'_>, value: Value) -> Result<()> {
        let field = self.name();
        let metric: &mut Metric = &mut *ctx.metric;
        match self {
            MetricField::Name => metric.name = value.into_str(field)?,
            MetricField::Description => metric.description = value.into_str(field)?,
            MetricField::Unit => metric.unit = value.into_str(field)?,
            MetricField::Type => return Err(Error::ReadOnlyField(field.to_string())),
            MetricField::AggregationTemporality => {
                let temporality = value.into_int(field)? as i32;
                match &mut metric.data {
                    Some(Data::Sum(s)) => s.aggregation_temporality = temporality,
                    Some(Data::Histogram(h)) => h.aggregation_temporality = temporality,
                    Some(Data::ExponentialHistogram(e)) => e.aggregation_temporality = temporality,
                    _ => {}
                }
            }
            MetricField::IsMonotonic => {
                let monotonic = value.into_bool(field)?;
                if let Some(Data::Sum(s)) = &mut metric.data {
                    s.is_monotonic = monotonic;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Data point fields
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum PointField {
    Attributes,
    Attribute(String),
    StartTimeUnixNano,
    TimeUnixNano,
    ValueDouble,
    ValueInt,
    Exemplars,
    Flags,
    Count,
    Sum,
    BucketCounts,
    ExplicitBounds,
    Scale,
    ZeroCount,
    QuantileValues,
}

impl PointField {
    fn name(&self) -> &'static str {
        match self {
            PointField::Attributes | PointField::Attribute(_) => "attributes",
            PointField::StartTimeUnixNano => "start_time_unix_nano",
            PointField::TimeUnixNano => "time_unix_nano",
            PointField::ValueDouble => "value_double",
            PointField::ValueInt => "value_int",
            PointField::Exemplars => "exemplars",
            PointField::Flags => "flags",
            PointField::Count => "count",
            PointField::Sum => "sum",
            PointField::BucketCounts => "bucket_counts",
            PointField::ExplicitBounds => "explicit_bounds",
            PointField::Scale => "scale",
            PointField::ZeroCount => "zero_count",
            PointField::QuantileValues => "quantile_values",
        }
    }
}

impl Getter<DataPoints> for PointField {
    fn get(&self, ctx: &TransformContext<'_>) -> Result<Value> {
        let Some(point) = ctx.point() else {
            return Ok(Value::Nil);
        };
        Ok(match self {
            PointField::Attributes => {
                Value::Map(each_point!(DataPoint, point, p => p.attributes.clone()))
            }
            PointField::Attribute(key) => {
                each_point!(DataPoint, point, p => get_map_value(&p.attributes, key))
            }
            PointField::StartTimeUnixNano => {
                Value::Int(each_point!(DataPoint, point, p => p.start_time_unix_nano) as i64)
            }
            PointField::TimeUnixNano => {
                Value::Int(each_point!(DataPoint, point, p => p.time_unix_nano) as i64)
            }
            PointField::Flags => Value::Int(each_point!(DataPoint, point, p => p.flags) as i64),
            PointField::ValueDouble => match point {
                DataPoint::Number(NumberDataPoint {
                    value: Some(number_data_point::Value::AsDouble(d)),
                    ..
                }) => Value::Double(*d),
                _ => Value::Nil,
            },
            PointField::ValueInt => match point {
                DataPoint::Number(NumberDataPoint {
                    value: Some(number_data_point::Value::AsInt(i)),
                    ..
                }) => Value::Int(*i),
                _ => Value::Nil,
            },
            PointField::Exemplars => match point {
                DataPoint::Number(p) => Value::Exemplars(p.exemplars.clone()),
                DataPoint::Histogram(p) => Value::Exemplars(p.exemplars.clone()),
                DataPoint::ExponentialHistogram(p) => Value::Exemplars(p.exemplars.clone()),
                DataPoint::Summary(_) => Value::Nil,
            },
            PointField::Count => match point {
                DataPoint::Histogram(p) => Value::Int(p.count as i64),
                DataPoint::ExponentialHistogram(p) => Value::Int(p.count as i64),
                DataPoint::Summary(p) => Value::Int(p.count as i64),
                DataPoint::Number(_) => Value::Nil,
            },
            PointField::Sum => match point {
                DataPoint::Histogram(p) => p.sum.map_or(Value::Nil, Value::Double),
                DataPoint::ExponentialHistogram(p) => p.sum.map_or(Value::Nil, Value::Double),
                DataPoint::Summary(p) => Value::Double(p.sum),
                DataPoint::Number(_) => Value::Nil,
            },
            PointField::BucketCounts => match point {
                DataPoint::Histogram(p) => counts_to_value(&p.bucket_counts),
                _ => Value::Nil,
            },
            PointField::ExplicitBounds => match point {
                DataPoint::Histogram(p) => bounds_to_value(&p.explicit_bounds),
                _ => Value::Nil,
            },
            PointField::Scale => match point {
                DataPoint::ExponentialHistogram(p) => Value::Int(p.scale as i64),
                _ => Value::Nil,
            },
            PointField::ZeroCount => match point {
                DataPoint::ExponentialHistogram(p) => Value::Int(p.zero_count as i64),
                _ => Value::Nil,
            },
            PointField::QuantileValues => match point {
                DataPoint::Summary(p) => Value::QuantileValues(p.quantile_values.clone()),
                _ => Value::Nil,
            },
        })
    }
}

impl Setter<DataPoints> for PointField {
    fn set(&self, ctx: &mut TransformContext<'_>, value: Value) -> Result<()> {
        let field = self.name();
        let point = ctx.point_mut();
        match self {
            PointField::Attributes => {
                let attrs = value.into_map(field)?;
                if let Some(point) = point {
                    each_point!(DataPointMut, point, p => p.attributes = attrs);
                }
            }
            PointField::Attribute(key) => match point {
                Some(point) => each_point!(DataPointMut, point, p => {
                    set_map_value(&mut p.attributes, key, value, field)?
                }),
                None => {
                    value.into_any_value(field)?;
                }
            },
            PointField::StartTimeUnixNano => {
                let nanos = value.into_int(field)? as u64;
                if let Some(point) = point {
                    each_point!(DataPointMut, point, p => p.start_time_unix_nano = nanos);
                }
            }
            PointField::TimeUnixNano => {
                let nanos = value.into_int(field)? as u64;
                if let Some(point) = point {
                    each_point!(DataPointMut, point, p => p.time_unix_nano = nanos);
                }
            }
            PointField::Flags => {
                let flags = value.into_int(field)? as u32;
                if let Some(point) = point {
                    each_point!(DataPointMut, point, p => p.flags = flags);
                }
            }
            PointField::ValueDouble => {
                let d = value.into_double(field)?;
                if let Some(DataPointMut::Number(p)) = point {
                    p.value = Some(number_data_point::Value::AsDouble(d));
                }
            }
            PointField::ValueInt => {
                let i = value.into_int(field)?;
                if let Some(DataPointMut::Number(p)) = point {
                    p.value = Some(number_data_point::Value::AsInt(i));
                }
            }
            PointField::Exemplars => {
                let exemplars = match value {
                    Value::Exemplars(e) => e,
                    other => return Err(Error::type_mismatch(field, "exemplars", &other)),
                };
                match point {
                    Some(DataPointMut::Number(p)) => replace_all(&mut p.exemplars, exemplars),
                    Some(DataPointMut::Histogram(p)) => replace_all(&mut p.exemplars, exemplars),
                    Some(DataPointMut::ExponentialHistogram(p)) => {
                        replace_all(&mut p.exemplars, exemplars)
                    }
                    Some(DataPointMut::Summary(_)) | None => {}
                }
            }
            PointField::Count => {
                let count = value.into_int(field)? as u64;
                match point {
                    Some(DataPointMut::Histogram(p)) => p.count = count,
                    Some(DataPointMut::ExponentialHistogram(p)) => p.count = count,
                    Some(DataPointMut::Summary(p)) => p.count = count,
                    Some(DataPointMut::Number(_)) | None => {}
                }
            }
            PointField::Sum => {
                let sum = value.into_double(field)?;
                match point {
                    Some(DataPointMut::Histogram(p)) => p.sum = Some(sum),
                    Some(DataPointMut::ExponentialHistogram(p)) => p.sum = Some(sum),
                    Some(DataPointMut::Summary(p)) => p.sum = sum,
                    Some(DataPointMut::Number(_)) | None => {}
                }
            }
            PointField::BucketCounts => {
                let counts = value_to_counts(value, field)?;
                if let Some(DataPointMut::Histogram(p)) = point {
                    p.bucket_counts = counts;
                }
            }
            PointField::ExplicitBounds => {
                let bounds = value_to_bounds(value, field)?;
                if let Some(DataPointMut::Histogram(p)) = point {
                    p.explicit_bounds = bounds;
                }
            }
            PointField::Scale => {
                let scale = value.into_int(field)? as i32;
                if let Some(DataPointMut::ExponentialHistogram(p)) = point {
                    p.scale = scale;
                }
            }
            PointField::ZeroCount => {
                let zero_count = value.into_int(field)? as u64;
                if let Some(DataPointMut::ExponentialHistogram(p)) = point {
                    p.zero_count = zero_count;
                }
            }
            PointField::QuantileValues => {
                let quantiles = match value {
                    Value::QuantileValues(q) => q,
                    other => return Err(Error::type_mismatch(field, "quantile values", &other)),
                };
                if let Some(DataPointMut::Summary(p)) = point {
                    replace_all(&mut p.quantile_values, quantiles);
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// positive / negative buckets
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Positive,
    Negative,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BucketsPart {
    Whole,
    Offset,
    BucketCounts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BucketsField {
    side: Side,
    part: BucketsPart,
}

impl BucketsField {
    fn name(&self) -> &'static str {
        match (self.side, self.part) {
            (Side::Positive, BucketsPart::Whole) => "positive",
            (Side::Positive, BucketsPart::Offset) => "positive.offset",
            (Side::Positive, BucketsPart::BucketCounts) => "positive.bucket_counts",
            (Side::Negative, BucketsPart::Whole) => "negative",
            (Side::Negative, BucketsPart::Offset) => "negative.offset",
            (Side::Negative, BucketsPart::BucketCounts) => "negative.bucket_counts",
        }
    }
}

impl Getter<DataPoints> for BucketsField {
    fn get(&self, ctx: &TransformContext<'_>) -> Result<Value> {
        let Some(DataPoint::ExponentialHistogram(p)) = ctx.point() else {
            return Ok(Value::Nil);
        };
        let buckets = match self.side {
            Side::Positive => p.positive.as_ref(),
            Side::Negative => p.negative.as_ref(),
        };
        Ok(match self.part {
            BucketsPart::Whole => Value::Buckets(buckets.cloned().unwrap_or_default()),
            BucketsPart::Offset => Value::Int(buckets.map_or(0, |b| b.offset as i64)),
            BucketsPart::BucketCounts => counts_to_value(
                buckets
                    .map(|b| b.bucket_counts.as_slice())
                    .unwrap_or_default(),
            ),
        })
    }
}

impl Setter<DataPoints> for BucketsField {
    fn set(&self, ctx: &mut TransformContext<'_>, value: Value) -> Result<()> {
        let field = self.name();
        let target = match ctx.point_mut() {
            Some(DataPointMut::ExponentialHistogram(p)) => Some(match self.side {
                Side::Positive => &mut p.positive,
                Side::Negative => &mut p.negative,
            }),
            _ => None,
        };
        match self.part {
            BucketsPart::Whole => {
                let buckets: Buckets = match value {
                    Value::Buckets(b) => b,
                    other => return Err(Error::type_mismatch(field, "buckets", &other)),
                };
                if let Some(target) = target {
                    *target = Some(buckets);
                }
            }
            BucketsPart::Offset => {
                let offset = value.into_int(field)? as i32;
                if let Some(target) = target {
                    target.get_or_insert_with(Default::default).offset = offset;
                }
            }
            BucketsPart::BucketCounts => {
                let counts = value_to_counts(value, field)?;
                if let Some(target) = target {
                    target.get_or_insert_with(Default::default).bucket_counts = counts;
                }
            }
        }
        Ok(())
    }
}
