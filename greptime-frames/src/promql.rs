//! Frames for the Prometheus compatible endpoint: one frame per series, named
//! after the legend format of the query.

use frame_structs::frame::{ColumnKind, Field, FrameMeta, ResultFrame};
use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{instrument, warn};

pub const LEGEND_FORMAT_AUTO: &str = "__auto";
const METRIC_NAME_LABEL: &str = "__name__";
const SUCCESS: &str = "success";

pub type Labels = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<PromData>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum PromData {
    Matrix(Vec<RangeSeries>),
    Vector(Vec<InstantSample>),
    Scalar(Sample),
    String(Sample),
}

/// `[<unix seconds>, "<value>"]`
pub type Sample = (f64, String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSeries {
    #[serde(default)]
    pub metric: Labels,
    #[serde(default)]
    pub values: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantSample {
    #[serde(default)]
    pub metric: Labels,
    pub value: Sample,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromQuery {
    pub expr: String,
    pub legend_format: String,
    pub step_ms: i64,
    pub ref_id: Option<String>,
}

impl PromQuery {
    pub fn executed_query_string(&self) -> String {
        format!("Expr: {}\nStep: {}", self.expr, duration_string(self.step_ms))
    }
}

/// `1h0m0s`, `1m30s`, `15s`, `1.5s`, `500ms`.
pub fn duration_string(millis: i64) -> String {
    if millis == 0 {
        return "0s".to_string();
    }
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.unsigned_abs();
    if millis < 1_000 {
        return format!("{sign}{millis}ms");
    }
    let hours = millis / 3_600_000;
    let minutes = millis % 3_600_000 / 60_000;
    let seconds = millis % 60_000 / 1_000;
    let fraction = millis % 1_000;
    let mut seconds = seconds.to_string();
    if fraction != 0 {
        let fraction = format!("{fraction:03}");
        seconds.push('.');
        seconds.push_str(fraction.trim_end_matches('0'));
    }
    match (hours, minutes) {
        (0, 0) => format!("{sign}{seconds}s"),
        (0, minutes) => format!("{sign}{minutes}m{seconds}s"),
        (hours, minutes) => format!("{sign}{hours}h{minutes}m{seconds}s"),
    }
}

/// `name{a="1", b="2"}` with labels sorted, in the way Prometheus prints a
/// series.
pub fn metric_name_from_labels(labels: &Labels) -> String {
    let name = labels.get(METRIC_NAME_LABEL);
    let mut pairs: Vec<String> = labels
        .iter()
        .filter(|(label, _)| label.as_str() != METRIC_NAME_LABEL)
        .map(|(label, value)| format!("{label}={value:?}"))
        .collect();
    match (pairs.is_empty(), name) {
        (true, Some(name)) => name.to_string(),
        (true, None) => "{}".to_string(),
        (false, name) => {
            pairs.sort();
            format!("{}{{{}}}", name.map(String::as_str).unwrap_or_default(), pairs.join(", "))
        }
    }
}

fn legend_regex() -> Option<&'static Regex> {
    static LEGEND: OnceLock<Option<Regex>> = OnceLock::new();
    LEGEND
        .get_or_init(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").ok())
        .as_ref()
}

/// Display name of a series. Empty means the host picks one.
pub fn series_name(query: &PromQuery, labels: &Labels) -> String {
    let mut legend = metric_name_from_labels(labels);
    if query.legend_format == LEGEND_FORMAT_AUTO {
        if !labels.is_empty() {
            legend = String::new();
        }
    } else if let Some(regex) = legend_regex().filter(|_| !query.legend_format.is_empty()) {
        legend = regex
            .replace_all(&query.legend_format, |captures: &Captures| {
                labels
                    .get(captures[1].trim())
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned();
    }
    if legend == "{}" {
        return query.expr.clone();
    }
    legend
}

fn sample_time(seconds: f64) -> Value {
    Value::from((seconds * 1_000.0).round() as i64)
}

fn sample_value(raw: &str) -> Value {
    match raw.trim().parse::<f64>() {
        Ok(value) => Value::from(value),
        Err(e) => {
            warn!("Sample value {raw:?} is not a number: {e}");
            Value::Null
        }
    }
}

fn series_frame(query: &PromQuery, labels: Labels, samples: &[Sample], kind: ColumnKind) -> ResultFrame {
    let name = series_name(query, &labels);
    let times = samples.iter().map(|(t, _)| sample_time(*t));
    let mut time = Field::from_values("Time", ColumnKind::Time, times);
    time.config.interval = Some(query.step_ms as f64);
    let values: Vec<Value> = match kind {
        ColumnKind::String => samples.iter().map(|(_, v)| Value::from(v.as_str())).collect(),
        _ => samples.iter().map(|(_, v)| sample_value(v)).collect(),
    };
    let mut value = Field::from_values("Value", kind, values).with_labels(labels);
    let mut frame = ResultFrame::new(None, query.ref_id.clone()).with_meta(FrameMeta::default());
    if !name.is_empty() {
        value = value.with_display_name(&name);
        frame.name = Some(name);
    }
    frame.push_field(time);
    frame.push_field(value);
    frame
}

#[instrument(skip_all, fields(expr = %query.expr))]
pub fn transform_promql(response: &PromResponse, query: &PromQuery) -> Vec<ResultFrame> {
    if response.status != SUCCESS {
        let message = response
            .error
            .clone()
            .unwrap_or_else(|| format!("PromQL query failed with status {}", response.status));
        warn!("PromQL query failed: {message} ({:?})", response.error_type);
        return vec![ResultFrame::error(message, query.ref_id.clone())];
    }
    let mut frames: Vec<ResultFrame> = match &response.data {
        Some(PromData::Matrix(series)) => series
            .iter()
            .map(|s| series_frame(query, s.metric.clone(), &s.values, ColumnKind::Number))
            .collect(),
        Some(PromData::Vector(samples)) => samples
            .iter()
            .map(|s| {
                series_frame(
                    query,
                    s.metric.clone(),
                    std::slice::from_ref(&s.value),
                    ColumnKind::Number,
                )
            })
            .collect(),
        Some(PromData::Scalar(sample)) => vec![series_frame(
            query,
            Labels::new(),
            std::slice::from_ref(sample),
            ColumnKind::Number,
        )],
        Some(PromData::String(sample)) => vec![series_frame(
            query,
            Labels::new(),
            std::slice::from_ref(sample),
            ColumnKind::String,
        )],
        None => vec![],
    };
    if frames.is_empty() {
        frames.push(ResultFrame::new(None, query.ref_id.clone()).with_meta(FrameMeta::default()));
    }
    if let Some(meta) = frames[0].meta.as_mut() {
        meta.executed_query_string = Some(query.executed_query_string());
    }
    frames
}
