use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// `None` when the row had no usable timestamp.
    pub timestamp_ms: Option<i64>,
    pub body: String,
    pub severity: Option<String>,
    pub id: Option<String>,
    pub context: IndexMap<String, String>,
    pub labels: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanEvent {
    pub timestamp: Option<i64>,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub operation_name: String,
    pub service_name: String,
    pub start_time_ms: Option<i64>,
    /// The duration cell exactly as stored, whatever its unit or JSON type.
    pub duration_ms: Option<Value>,
    pub tags: Vec<KeyValue>,
    pub service_tags: Vec<KeyValue>,
    pub events: Vec<SpanEvent>,
}
