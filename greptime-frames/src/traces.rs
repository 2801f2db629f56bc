//! Trace-shaped frame: one row per span of a single trace.

use crate::error::TraceError;
use backtraced_error::SerdeJsonError;
use frame_structs::builder::{ColumnHint, QueryBuilderOptions};
use frame_structs::frame::{ColumnKind, Field, FrameMeta, ResultFrame};
use frame_structs::records::{KeyValue, SpanEvent, SpanRecord};
use frame_structs::response::GreptimeResponse;
use frame_structs::time_conversion::date_value_to_millis;
use frame_structs::{is_truthy, value_to_js_string};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

pub const TRACE_FRAME_REF_ID: &str = "Trace ID";
pub const TRACE_FRAME_NAME: &str = "Trace Details";
const UNKNOWN: &str = "unknown";

/// Column each span property is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFieldNames {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub span_name: String,
    pub service_name: String,
    pub start_time: String,
    pub duration: String,
    pub events: String,
}

impl Default for TraceFieldNames {
    fn default() -> Self {
        Self {
            trace_id: "trace_id".to_string(),
            span_id: "span_id".to_string(),
            parent_span_id: "parent_span_id".to_string(),
            span_name: "span_name".to_string(),
            service_name: "service_name".to_string(),
            start_time: "timestamp".to_string(),
            duration: "duration_nano".to_string(),
            events: "span_events".to_string(),
        }
    }
}

impl TraceFieldNames {
    /// Defaults, except where a builder column carries the matching hint.
    pub fn from_builder_options(options: &QueryBuilderOptions) -> Self {
        let defaults = Self::default();
        let pick = |hint: ColumnHint, default: String| {
            options
                .column_by_hint(hint)
                .map(|column| column.output_name().to_string())
                .unwrap_or(default)
        };
        Self {
            trace_id: pick(ColumnHint::TraceId, defaults.trace_id),
            span_id: pick(ColumnHint::TraceSpanId, defaults.span_id),
            parent_span_id: pick(ColumnHint::TraceParentSpanId, defaults.parent_span_id),
            span_name: pick(ColumnHint::TraceOperationName, defaults.span_name),
            service_name: pick(ColumnHint::TraceServiceName, defaults.service_name),
            start_time: pick(ColumnHint::TraceStartTime, defaults.start_time),
            duration: pick(ColumnHint::TraceDurationTime, defaults.duration),
            events: pick(ColumnHint::TraceEvents, defaults.events),
        }
    }
}

fn is_hinted(options: &QueryBuilderOptions, hint: ColumnHint, column_name: &str) -> bool {
    options
        .columns_by_hint(hint)
        .any(|column| column.matches(column_name))
}

fn text(data: &IndexMap<&str, &Value>, key: &str) -> Option<String> {
    match data.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value_to_js_string(value)),
    }
}

fn truthy_text(data: &IndexMap<&str, &Value>, key: &str) -> Option<String> {
    data.get(key)
        .filter(|value| is_truthy(value))
        .map(|value| value_to_js_string(value))
}

/// `[]`, a JSON array in a string, or nothing at all. Any other JSON value
/// carries no events, text that is not JSON is an error.
pub fn parse_span_events(row: usize, raw: Option<&Value>) -> Result<Vec<SpanEvent>, TraceError> {
    let parsed;
    let events = match raw {
        Some(value) if !is_truthy(value) => return Ok(vec![]),
        None => return Ok(vec![]),
        Some(Value::String(text)) => {
            parsed = serde_json::from_str::<Value>(text).map_err(|e| TraceError::SpanEvents {
                row,
                source: SerdeJsonError::with_input_sample(e, "Parsing span events", text),
            })?;
            &parsed
        }
        Some(value) => value,
    };
    let Value::Array(events) = events else {
        debug!("Span events of row {row} are not an array, ignoring them");
        return Ok(vec![]);
    };
    Ok(events
        .iter()
        .map(|event| SpanEvent {
            timestamp: event.get("time").and_then(date_value_to_millis),
            fields: match event.get("attributes") {
                Some(Value::Object(attributes)) => attributes.clone(),
                _ => Map::new(),
            },
        })
        .collect())
}

/// Spans from `rows`, whose cells are laid out as `column_names`.
pub fn build_span_records(
    column_names: &[String],
    rows: &[Value],
    options: &QueryBuilderOptions,
) -> Result<Vec<SpanRecord>, TraceError> {
    let names = TraceFieldNames::from_builder_options(options);
    let mut spans = Vec::with_capacity(rows.len());
    for (row_index, row) in rows.iter().enumerate() {
        let cells = row.as_array().map(Vec::as_slice).unwrap_or_default();
        let mut tags = vec![];
        let mut service_tags = vec![];
        let mut data: IndexMap<&str, &Value> = IndexMap::new();
        for (index, name) in column_names.iter().enumerate() {
            let value = cells.get(index).unwrap_or(&Value::Null);
            if is_hinted(options, ColumnHint::TraceTags, name) {
                tags.push(KeyValue {
                    key: name.clone(),
                    value: value.clone(),
                });
            } else if is_hinted(options, ColumnHint::TraceServiceTags, name) {
                service_tags.push(KeyValue {
                    key: name.clone(),
                    value: value.clone(),
                });
            } else {
                data.insert(name.as_str(), value);
            }
        }
        spans.push(SpanRecord {
            trace_id: text(&data, &names.trace_id).unwrap_or_default(),
            span_id: text(&data, &names.span_id).unwrap_or_default(),
            parent_span_id: truthy_text(&data, &names.parent_span_id),
            operation_name: truthy_text(&data, &names.span_name).unwrap_or_else(|| UNKNOWN.to_string()),
            service_name: truthy_text(&data, &names.service_name).unwrap_or_else(|| UNKNOWN.to_string()),
            start_time_ms: data.get(names.start_time.as_str()).and_then(|v| date_value_to_millis(v)),
            duration_ms: data.get(names.duration.as_str()).map(|v| (*v).clone()),
            tags,
            service_tags,
            events: parse_span_events(row_index, data.get(names.events.as_str()).copied())?,
        });
    }
    Ok(spans)
}

fn key_values_to_json(key_values: &[KeyValue]) -> Value {
    Value::Array(
        key_values
            .iter()
            .map(|kv| json!({"key": kv.key, "value": kv.value}))
            .collect(),
    )
}

fn events_to_json(events: &[SpanEvent]) -> Value {
    Value::Array(
        events
            .iter()
            .map(|e| json!({"timestamp": e.timestamp, "fields": e.fields}))
            .collect(),
    )
}

fn optional<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

pub fn span_records_to_frame(spans: &[SpanRecord]) -> ResultFrame {
    let mut frame = ResultFrame::new(
        Some(TRACE_FRAME_NAME.to_string()),
        Some(TRACE_FRAME_REF_ID.to_string()),
    )
    .with_meta(FrameMeta::trace());
    let string_field = |name: &str, get: fn(&SpanRecord) -> Value| {
        Field::from_values(name, ColumnKind::String, spans.iter().map(get))
    };
    frame.push_field(string_field("traceID", |s| s.trace_id.as_str().into()));
    frame.push_field(string_field("spanID", |s| s.span_id.as_str().into()));
    frame.push_field(string_field("parentSpanID", |s| optional(s.parent_span_id.clone())));
    frame.push_field(string_field("operationName", |s| s.operation_name.as_str().into()));
    frame.push_field(string_field("serviceName", |s| s.service_name.as_str().into()));
    frame.push_field(Field::from_values(
        "startTime",
        ColumnKind::Time,
        spans.iter().map(|s| optional(s.start_time_ms)),
    ));
    frame.push_field(
        Field::from_values(
            "duration",
            ColumnKind::Number,
            spans.iter().map(|s| s.duration_ms.clone().unwrap_or(Value::Null)),
        )
        .with_unit("ms"),
    );
    frame.push_field(Field::from_values(
        "tags",
        ColumnKind::Other,
        spans.iter().map(|s| key_values_to_json(&s.tags)),
    ));
    frame.push_field(Field::from_values(
        "serviceTags",
        ColumnKind::Other,
        spans.iter().map(|s| key_values_to_json(&s.service_tags)),
    ));
    frame.push_field(Field::from_values(
        "logs",
        ColumnKind::Other,
        spans.iter().map(|s| events_to_json(&s.events)),
    ));
    frame.length = spans.len();
    frame
}

/// A single trace frame, or nothing when the first result set has no rows.
#[instrument(skip_all)]
pub fn transform_trace_details(
    response: &GreptimeResponse,
    options: &QueryBuilderOptions,
) -> Result<Vec<ResultFrame>, TraceError> {
    let Some(records) = response.first_output().and_then(|o| o.records.as_ref()) else {
        return Ok(vec![]);
    };
    let Some(rows) = records.rows.as_ref() else {
        return Ok(vec![]);
    };
    let column_names: Vec<String> = match records
        .schema
        .as_ref()
        .and_then(|s| s.column_schemas.as_ref())
    {
        Some(columns) => columns.iter().map(|c| c.name.clone()).collect(),
        None => options
            .columns
            .iter()
            .map(|c| c.output_name().to_string())
            .collect(),
    };
    let spans = build_span_records(&column_names, rows, options)?;
    debug!("Built {} spans", spans.len());
    Ok(vec![span_records_to_frame(&spans)])
}
