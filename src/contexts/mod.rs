//! Context kinds: the path vocabulary and enum symbols of spans, metric data
//! points and log records, each with its resource and scope ancestors.

pub mod common;
pub mod datapoints;
pub mod logs;
pub mod traces;

pub use common::{get_map_value, set_map_value, ResourceContext, ScopeContext};
pub use datapoints::DataPoints;
pub use logs::Logs;
pub use traces::Traces;
