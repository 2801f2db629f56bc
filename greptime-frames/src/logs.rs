//! Log-shaped frames: one row per log line, columns picked by role.

use crate::transpose::well_formed_row;
use crate::type_mapping::normalize_time_value;
use frame_structs::builder::{ColumnHint, LogColumnAliases};
use frame_structs::frame::{ColumnKind, Field, FrameMeta, ResultFrame};
use frame_structs::records::LogRecord;
use frame_structs::response::{ColumnSchema, GreptimeResponse, ResultSet};
use frame_structs::time_conversion::{date_value_to_millis, TimeUnit};
use frame_structs::value_to_js_string;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{error, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogOptions {
    pub aliases: LogColumnAliases,
    /// Exact column names shown next to each line instead of inside `labels`.
    pub context_columns: Vec<String>,
    pub ref_id: Option<String>,
}

/// Which column index plays which part of a log line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogColumnRoles {
    pub time: Option<usize>,
    pub message: Option<usize>,
    pub severity: Option<usize>,
    pub id: Option<usize>,
    pub context: Vec<usize>,
    pub labels: Vec<usize>,
}

/// Column names are lowercased before being compared with the aliases, the
/// context list is matched as is. When two columns share an alias the first
/// one takes the role and the second is treated like any other column.
pub fn resolve_log_roles(
    columns: &[ColumnSchema],
    aliases: &LogColumnAliases,
    context_columns: &[String],
) -> LogColumnRoles {
    let mut roles = LogColumnRoles::default();
    for (index, column) in columns.iter().enumerate() {
        let lower = column.name.to_lowercase();
        let is_alias = |hint: ColumnHint| aliases.alias(hint) == Some(lower.as_str());
        let slot = if is_alias(ColumnHint::Time) {
            Some(&mut roles.time)
        } else if is_alias(ColumnHint::LogMessage) {
            Some(&mut roles.message)
        } else if is_alias(ColumnHint::LogLevel) {
            Some(&mut roles.severity)
        } else if is_alias(ColumnHint::LogId) {
            Some(&mut roles.id)
        } else {
            None
        };
        if let Some(slot) = slot.filter(|slot| slot.is_none()) {
            *slot = Some(index);
            continue;
        }
        if context_columns.iter().any(|c| c == &column.name) {
            roles.context.push(index);
        } else {
            roles.labels.push(index);
        }
    }
    roles
}

fn text_or_empty(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => value_to_js_string(other),
    }
}

fn optional_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(value_to_js_string(other)),
    }
}

/// Time column unit applied first, then truncated to whole milliseconds.
fn log_timestamp(value: &Value, unit: Option<TimeUnit>) -> Option<i64> {
    date_value_to_millis(&normalize_time_value(value, unit))
}

/// Rows that are not one value per column are dropped.
///
/// A `NULL` body or context cell becomes an empty string and a `NULL`
/// severity or id becomes an absent value, rather than the literal text
/// `"null"` a plain string conversion would give.
pub fn build_log_records(result_set: ResultSet<'_>, roles: &LogColumnRoles) -> Vec<LogRecord> {
    let columns = result_set.columns;
    let time_unit = roles
        .time
        .and_then(|i| columns[i].data_type.as_deref())
        .and_then(TimeUnit::from_declared_type);
    let mut records = Vec::with_capacity(result_set.rows.len());
    for (row_index, row) in result_set.rows.iter().enumerate() {
        let Some(values) = well_formed_row(row, columns.len()) else {
            error!("Log row {row_index} does not have {} values. Skipping row.", columns.len());
            continue;
        };
        records.push(LogRecord {
            timestamp_ms: roles.time.and_then(|i| log_timestamp(&values[i], time_unit)),
            body: roles.message.map(|i| text_or_empty(&values[i])).unwrap_or_default(),
            severity: roles.severity.and_then(|i| optional_text(&values[i])),
            id: roles.id.and_then(|i| optional_text(&values[i])),
            context: roles
                .context
                .iter()
                .map(|&i| (columns[i].name.clone(), text_or_empty(&values[i])))
                .collect(),
            labels: roles
                .labels
                .iter()
                .map(|&i| (columns[i].name.clone(), values[i].clone()))
                .collect(),
        });
    }
    records
}

/// `timestamp`, `body`, then `severity` and `id` when a column holds them,
/// one field per context column and finally `labels`.
pub fn log_records_to_frame(
    records: &[LogRecord],
    roles: &LogColumnRoles,
    columns: &[ColumnSchema],
    ref_id: Option<String>,
) -> ResultFrame {
    let mut frame = ResultFrame::new(None, ref_id).with_meta(FrameMeta::logs());
    frame.push_field(Field::from_values(
        "timestamp",
        ColumnKind::Time,
        records.iter().map(|r| r.timestamp_ms.map_or(Value::Null, Value::from)),
    ));
    frame.push_field(Field::from_values(
        "body",
        ColumnKind::String,
        records.iter().map(|r| r.body.as_str()),
    ));
    if roles.severity.is_some() {
        frame.push_field(Field::from_values(
            "severity",
            ColumnKind::String,
            records.iter().map(|r| r.severity.clone().map_or(Value::Null, Value::from)),
        ));
    }
    if roles.id.is_some() {
        frame.push_field(Field::from_values(
            "id",
            ColumnKind::String,
            records.iter().map(|r| r.id.clone().map_or(Value::Null, Value::from)),
        ));
    }
    for &index in &roles.context {
        let name = &columns[index].name;
        frame.push_field(Field::from_values(
            name,
            ColumnKind::String,
            records
                .iter()
                .map(|r| r.context.get(name).cloned().unwrap_or_default()),
        ));
    }
    frame.push_field(Field::from_values(
        "labels",
        ColumnKind::Other,
        records.iter().map(|r| labels_to_json(&r.labels)),
    ));
    frame.length = records.len();
    frame
}

fn labels_to_json(labels: &IndexMap<String, Value>) -> Value {
    Value::Object(
        labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Map<String, Value>>(),
    )
}

/// `None` when the response has no first result set to read lines from.
#[instrument(skip_all, fields(ref_id = ?options.ref_id))]
pub fn transform_logs(response: &GreptimeResponse, options: &LogOptions) -> Option<ResultFrame> {
    let Some(output) = response.first_output() else {
        error!(
            "GreptimeDB query failed or returned no data: {}",
            response.error.as_deref().unwrap_or("no error message")
        );
        return None;
    };
    let Some(result_set) = output.result_set() else {
        error!("Invalid GreptimeDB records format, missing schema or rows");
        return None;
    };
    let roles = resolve_log_roles(result_set.columns, &options.aliases, &options.context_columns);
    if roles.time.is_none() {
        warn!("No column matches the time alias, log lines will have no timestamp");
    }
    let records = build_log_records(result_set, &roles);
    Some(log_records_to_frame(
        &records,
        &roles,
        result_set.columns,
        options.ref_id.clone(),
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use frame_structs::frame::VisualisationType;
    use serde_json::json;

    fn columns(names: &[(&str, &str)]) -> Vec<ColumnSchema> {
        names.iter().map(|(n, t)| ColumnSchema::new(*n, *t)).collect()
    }

    fn aliases() -> LogColumnAliases {
        LogColumnAliases::default()
            .with_alias(ColumnHint::Time, "ts")
            .with_alias(ColumnHint::LogMessage, "msg")
    }

    #[test]
    fn roles_follow_aliases_then_context_then_labels() {
        let columns = columns(&[
            ("TS", "TimestampMillisecond"),
            ("msg", "String"),
            ("level", "String"),
            ("host", "String"),
            ("pod", "String"),
        ]);
        let roles = resolve_log_roles(&columns, &aliases(), &["host".to_string()]);
        assert_eq!(
            roles,
            LogColumnRoles {
                time: Some(0),
                message: Some(1),
                severity: Some(2),
                id: None,
                context: vec![3],
                labels: vec![4],
            }
        );
    }

    #[test]
    fn context_columns_match_exact_names() {
        let columns = columns(&[("Host", "String")]);
        let roles = resolve_log_roles(&columns, &aliases(), &["host".to_string()]);
        assert!(roles.context.is_empty());
        assert_eq!(roles.labels, vec![0]);
    }

    #[test]
    fn second_column_with_same_alias_is_a_label() {
        let columns = columns(&[("msg", "String"), ("MSG", "String")]);
        let roles = resolve_log_roles(&columns, &aliases(), &[]);
        assert_eq!(roles.message, Some(0));
        assert_eq!(roles.labels, vec![1]);
    }

    #[test]
    fn ts_msg_host_log_frame() {
        let response: GreptimeResponse = serde_json::from_value(json!({
            "code": 0,
            "output": [{"records": {
                "schema": {"column_schemas": [
                    {"name": "ts", "data_type": "TimestampNanosecond"},
                    {"name": "msg", "data_type": "String"},
                    {"name": "host", "data_type": "String"}
                ]},
                "rows": [
                    [1_700_000_000_123_456_789i64, "started", "web-1"],
                    [1_700_000_001_000_000_000i64, null, null]
                ]
            }}]
        }))
        .unwrap();
        let options = LogOptions {
            aliases: aliases(),
            context_columns: vec!["host".to_string()],
            ref_id: Some("A".to_string()),
        };
        let frame = transform_logs(&response, &options).unwrap();
        assert_eq!(frame.ref_id.as_deref(), Some("A"));
        let meta = frame.meta.as_ref().unwrap();
        assert_eq!(meta.preferred_visualisation_type, Some(VisualisationType::Logs));
        let names: Vec<&str> = frame.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["timestamp", "body", "host", "labels"]);
        assert_eq!(
            frame.field("timestamp").unwrap().values,
            vec![Some(json!(1_700_000_000_123i64)), Some(json!(1_700_000_001_000i64))]
        );
        assert_eq!(
            frame.field("body").unwrap().values,
            vec![Some(json!("started")), Some(json!(""))]
        );
        assert_eq!(
            frame.field("host").unwrap().values,
            vec![Some(json!("web-1")), Some(json!(""))]
        );
        assert_eq!(frame.field("labels").unwrap().values, vec![Some(json!({})), Some(json!({}))]);
        assert_eq!(frame.length, 2);
    }

    #[test]
    fn severity_and_id_fields_only_when_resolved() {
        let columns = columns(&[
            ("timestamp", "String"),
            ("body", "String"),
            ("level", "String"),
            ("trace", "String"),
            ("region", "String"),
        ]);
        let aliases = LogColumnAliases::default().with_alias(ColumnHint::LogId, "trace");
        let roles = resolve_log_roles(&columns, &aliases, &[]);
        let rows = [json!(["2024-01-01T00:00:00.5Z", "hi", null, "t1", "eu"])];
        let records = build_log_records(ResultSet::new(&columns, &rows), &roles);
        assert_eq!(records[0].timestamp_ms, Some(1_704_067_200_500));
        assert_eq!(records[0].severity, None);
        assert_eq!(records[0].id.as_deref(), Some("t1"));
        let frame = log_records_to_frame(&records, &roles, &columns, None);
        assert_eq!(
            frame.field("severity").unwrap().values,
            vec![Some(Value::Null)]
        );
        assert_eq!(frame.field("id").unwrap().values, vec![Some(json!("t1"))]);
        assert_eq!(
            frame.field("labels").unwrap().values,
            vec![Some(json!({"region": "eu"}))]
        );
    }

    #[test]
    fn no_time_column_gives_null_timestamps() {
        let columns = columns(&[("body", "String")]);
        let roles = resolve_log_roles(&columns, &LogColumnAliases::default(), &[]);
        let rows = [json!(["a"]), json!(["b", "extra"])];
        let records = build_log_records(ResultSet::new(&columns, &rows), &roles);
        assert_eq!(records.len(), 1);
        let frame = log_records_to_frame(&records, &roles, &columns, None);
        assert_eq!(frame.field("timestamp").unwrap().values, vec![Some(Value::Null)]);
        assert!(frame.field("severity").is_none());
    }

    #[test]
    fn missing_result_set_is_a_failure() {
        let options = LogOptions::default();
        let response: GreptimeResponse =
            serde_json::from_value(json!({"code": 1, "error": "nope"})).unwrap();
        assert!(transform_logs(&response, &options).is_none());
        let response: GreptimeResponse =
            serde_json::from_value(json!({"code": 0, "output": [{"affectedrows": 0}]})).unwrap();
        assert!(transform_logs(&response, &options).is_none());
    }
}
