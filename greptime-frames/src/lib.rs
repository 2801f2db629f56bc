//! Turns GreptimeDB query responses into column-major frames ready to be
//! plotted: tables and time series, log lines, trace spans and PromQL series.

pub mod cli;
pub mod error;
pub mod group_by;
pub mod logs;
pub mod promql;
pub mod traces;
pub mod transpose;
pub mod type_mapping;

pub use error::TraceError;
pub use logs::{transform_logs, LogOptions};
pub use promql::{transform_promql, PromQuery, PromResponse};
pub use traces::transform_trace_details;
pub use transpose::{transform_response, transform_response_value, TransformOptions};
