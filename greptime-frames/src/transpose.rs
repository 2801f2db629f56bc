use crate::group_by::{grouping_column_indices, parse_group_by_columns, split_into_series};
use crate::type_mapping::ColumnPlan;
use frame_structs::frame::{Cell, Field, ResultFrame};
use frame_structs::response::{GreptimeResponse, ResultSet};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOptions {
    pub ref_id: Option<String>,
    /// Query text the response answers, only used to look for `GROUP BY`.
    pub sql: Option<String>,
}

/// A row is usable only if it is an array with one value per column.
pub fn well_formed_row(row: &Value, column_count: usize) -> Option<&[Value]> {
    match row {
        Value::Array(values) if values.len() == column_count => Some(values),
        _ => None,
    }
}

/// Column-major copy of `rows`, one `Vec` per plan. Rows of the wrong shape
/// leave a missing cell in every column so indexes stay aligned.
pub fn transpose_rows<'a, I>(plans: &[ColumnPlan], rows: I) -> Vec<Vec<Cell>>
where
    I: IntoIterator<Item = &'a Value>,
{
    let rows = rows.into_iter();
    let mut columns: Vec<Vec<Cell>> = plans
        .iter()
        .map(|_| Vec::with_capacity(rows.size_hint().0))
        .collect();
    for (row_index, row) in rows.enumerate() {
        match well_formed_row(row, plans.len()) {
            Some(values) => {
                for ((column, plan), value) in columns.iter_mut().zip(plans).zip(values) {
                    column.push(plan.convert(value));
                }
            }
            None => {
                error!(
                    "Row {row_index} has incorrect length ({}), expected {}. Filling with missing values.",
                    row_len(row),
                    plans.len()
                );
                for column in &mut columns {
                    column.push(None);
                }
            }
        }
    }
    columns
}

fn row_len(row: &Value) -> String {
    match row {
        Value::Array(values) => values.len().to_string(),
        _ => "not an array".to_string(),
    }
}

pub fn fields_from_columns(plans: &[ColumnPlan], columns: Vec<Vec<Cell>>) -> Vec<Field> {
    plans
        .iter()
        .zip(columns)
        .map(|(plan, values)| Field::new(&plan.name, plan.kind, values).with_display_name(&plan.name))
        .collect()
}

/// A result set with no columns gives an empty frame rather than no frame.
pub fn transpose(result_set: ResultSet<'_>, name: Option<String>, ref_id: Option<String>) -> ResultFrame {
    let mut frame = ResultFrame::new(name, ref_id);
    if result_set.columns.is_empty() {
        return frame;
    }
    let plans = ColumnPlan::for_columns(result_set.columns);
    let columns = transpose_rows(&plans, result_set.rows);
    for field in fields_from_columns(&plans, columns) {
        frame.push_field(field);
    }
    frame.length = result_set.rows.len();
    frame
}

/// Tabular and time series entry point. Never fails: a broken response gives
/// no frames, or a single error frame when the database sent a message.
#[instrument(skip_all, fields(ref_id = ?options.ref_id))]
pub fn transform_response(response: &GreptimeResponse, options: &TransformOptions) -> Vec<ResultFrame> {
    let outputs = match response.output.as_ref() {
        Some(outputs) if !outputs.is_empty() => outputs,
        _ => return match &response.error {
            Some(message) => {
                error!("GreptimeDB query failed: {message} (Code: {})", response.code);
                vec![ResultFrame::error(message.to_string(), options.ref_id.clone())]
            }
            None => {
                error!("Invalid, missing or empty \"output\" array in GreptimeDB response.");
                vec![]
            }
        },
    };
    let group_by = options
        .sql
        .as_deref()
        .map(parse_group_by_columns)
        .unwrap_or_default();
    let mut frames = vec![];
    for (index, output) in outputs.iter().enumerate() {
        let Some(result_set) = output.result_set() else {
            warn!("Skipping invalid result set at index {index}. Missing schema, column_schemas, or rows.");
            continue;
        };
        let name = format!("Result {}", index + 1);
        if result_set.columns.is_empty() {
            info!("Result set at index {index} contains no columns.");
        }
        let grouping = grouping_column_indices(result_set.columns, &group_by);
        if grouping.is_empty() {
            frames.push(transpose(result_set, Some(name), options.ref_id.clone()));
        } else {
            frames.extend(split_into_series(result_set, &grouping, options.ref_id.clone()));
        }
    }
    frames
}

/// Same as [`transform_response`] for a response that was not deserialized
/// yet, a top level of the wrong shape counts as a missing `output`.
pub fn transform_response_value(response: &Value, options: &TransformOptions) -> Vec<ResultFrame> {
    match serde_json::from_value::<GreptimeResponse>(response.clone()) {
        Ok(response) => transform_response(&response, options),
        Err(e) => {
            error!("GreptimeDB response has an unexpected shape: {e}");
            let message = response.get("error").and_then(Value::as_str);
            match message {
                Some(message) => vec![ResultFrame::error(message, options.ref_id.clone())],
                None => vec![],
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use frame_structs::frame::ColumnKind;
    use frame_structs::response::ColumnSchema;
    use serde_json::json;

    fn response(value: Value) -> GreptimeResponse {
        serde_json::from_value(value).unwrap()
    }

    fn options(sql: Option<&str>) -> TransformOptions {
        TransformOptions {
            ref_id: Some("A".to_string()),
            sql: sql.map(str::to_string),
        }
    }

    #[test]
    fn rows_become_columns() {
        let response = response(json!({
            "code": 0,
            "output": [{"records": {
                "schema": {"column_schemas": [
                    {"name": "ts", "data_type": "TimestampSecond"},
                    {"name": "host", "data_type": "String"},
                    {"name": "cpu", "data_type": "Float64"},
                    {"name": "up", "data_type": "Boolean"}
                ]},
                "rows": [[1700000000, "a", 0.5, true], [1700000001, null, null, false]]
            }}]
        }));
        let frames = transform_response(&response, &options(None));
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.name.as_deref(), Some("Result 1"));
        assert_eq!(frame.ref_id.as_deref(), Some("A"));
        assert_eq!(frame.length, 2);
        let kinds: Vec<ColumnKind> = frame.fields.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![ColumnKind::Time, ColumnKind::String, ColumnKind::Number, ColumnKind::Boolean]
        );
        assert_eq!(
            frame.field("ts").unwrap().values,
            vec![Some(json!(1_700_000_000_000i64)), Some(json!(1_700_000_001_000i64))]
        );
        assert_eq!(frame.field("host").unwrap().values, vec![Some(json!("a")), Some(Value::Null)]);
        assert_eq!(frame.field("cpu").unwrap().config.display_name.as_deref(), Some("cpu"));
    }

    #[test]
    fn zero_columns_give_an_empty_frame() {
        let response = response(json!({
            "code": 0,
            "output": [{"records": {"schema": {"column_schemas": []}, "rows": []}}]
        }));
        let frames = transform_response(&response, &options(None));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].length, 0);
        assert!(frames[0].fields.is_empty());
    }

    #[test]
    fn malformed_rows_only_blank_their_own_slot() {
        tracing_config_helper::setup_tracing_console_logging_for_test();
        let columns = [
            ColumnSchema::new("a", "Int64"),
            ColumnSchema::new("b", "String"),
        ];
        let rows = [json!([1, "x"]), json!([2]), json!("garbage"), json!([3, "z"])];
        let frame = transpose(ResultSet::new(&columns, &rows), None, None);
        assert_eq!(frame.length, 4);
        assert_eq!(
            frame.field("a").unwrap().values,
            vec![Some(json!(1)), None, None, Some(json!(3))]
        );
        assert_eq!(
            frame.field("b").unwrap().values,
            vec![Some(json!("x")), None, None, Some(json!("z"))]
        );
    }

    #[test]
    fn error_without_output_gives_error_frame() {
        let response = response(json!({"code": 1, "error": "boom"}));
        let frames = transform_response(&response, &options(None));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].fields.len(), 1);
        assert_eq!(frames[0].fields[0].kind, ColumnKind::String);
        assert_eq!(frames[0].fields[0].values, vec![Some(json!("boom"))]);
        assert_eq!(frames[0].ref_id.as_deref(), Some("A"));
    }

    #[test]
    fn error_with_empty_output_gives_error_frame() {
        let response = response(json!({"code": 1004, "error": "boom", "output": []}));
        let frames = transform_response(&response, &options(None));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].fields[0].name, "Error");
        assert_eq!(frames[0].fields[0].values, vec![Some(json!("boom"))]);
    }

    #[test]
    fn no_output_and_no_error_gives_nothing() {
        assert!(transform_response(&response(json!({"code": 0})), &options(None)).is_empty());
        assert!(transform_response(&response(json!({"code": 0, "output": []})), &options(None)).is_empty());
    }

    #[test]
    fn invalid_result_sets_are_skipped() {
        let response = response(json!({
            "code": 0,
            "output": [
                {"affectedrows": 1},
                {"records": {"schema": {"column_schemas": [{"name": "n", "data_type": "Int32"}]}, "rows": [[7]]}}
            ]
        }));
        let frames = transform_response(&response, &options(None));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name.as_deref(), Some("Result 2"));
        assert_eq!(frames[0].fields[0].values, vec![Some(json!(7))]);
    }

    #[test]
    fn every_statement_gets_its_own_frame() {
        let result = json!({"records": {
            "schema": {"column_schemas": [{"name": "n", "data_type": "Int32"}]},
            "rows": [[1]]
        }});
        let response = response(json!({"code": 0, "output": [result.clone(), result]}));
        let frames = transform_response(&response, &options(None));
        let names: Vec<_> = frames.iter().map(|f| f.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["Result 1", "Result 2"]);
    }

    #[test]
    fn wrongly_shaped_top_level() {
        let frames = transform_response_value(&json!({"output": "nope", "error": "bad"}), &options(None));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].fields[0].values, vec![Some(json!("bad"))]);
        assert!(transform_response_value(&json!([1, 2]), &options(None)).is_empty());
    }

    #[test]
    fn group_by_on_unknown_column_is_plain_table() {
        let response = response(json!({
            "code": 0,
            "output": [{"records": {
                "schema": {"column_schemas": [
                    {"name": "a", "data_type": "Int64"},
                    {"name": "b", "data_type": "Int64"}
                ]},
                "rows": [[1, 10], [2], [1, 30]]
            }}]
        }));
        let frames = transform_response(&response, &options(Some("SELECT a,b FROM t GROUP BY host")));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name.as_deref(), Some("Result 1"));
        assert_eq!(frames[0].length, 3);
        assert_eq!(
            frames[0].field("b").unwrap().values,
            vec![Some(json!(10)), None, Some(json!(30))]
        );
        assert_eq!(frames[0].field("a").unwrap().config.display_name.as_deref(), Some("a"));
    }

    #[test]
    fn group_by_query_splits_series() {
        let response = response(json!({
            "code": 0,
            "output": [{"records": {
                "schema": {"column_schemas": [
                    {"name": "a", "data_type": "Int64"},
                    {"name": "b", "data_type": "Int64"}
                ]},
                "rows": [[1, 10], [2, 20]]
            }}]
        }));
        let frames = transform_response(&response, &options(Some("SELECT a,b FROM t GROUP BY a")));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].name.as_deref(), Some("a:1;"));
        assert_eq!(frames[1].name.as_deref(), Some("a:2;"));
    }
}
