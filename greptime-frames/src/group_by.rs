//! Splitting one flat result set into one frame per series.
//!
//! The grouping columns come from the query text, found by plain text
//! matching: a `GROUP BY` inside a string literal or a subquery is taken at
//! face value.

use crate::transpose::{fields_from_columns, transpose_rows, well_formed_row};
use crate::type_mapping::ColumnPlan;
use frame_structs::frame::ResultFrame;
use frame_structs::response::{ColumnSchema, ResultSet};
use frame_structs::value_to_js_string;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, error};

fn group_by_regex() -> Option<&'static Regex> {
    static GROUP_BY: OnceLock<Option<Regex>> = OnceLock::new();
    GROUP_BY
        .get_or_init(|| Regex::new(r"(?i)\bGROUP\s+BY\s+([^\s,]+(?:\s*,\s*[^\s,]+)*)").ok())
        .as_ref()
}

/// Column names listed after the first `GROUP BY`, in query order.
pub fn parse_group_by_columns(sql: &str) -> Vec<String> {
    let Some(captures) = group_by_regex().and_then(|regex| regex.captures(sql)) else {
        return vec![];
    };
    let Some(list) = captures.get(1) else {
        return vec![];
    };
    list.as_str()
        .split(',')
        .map(|column| {
            column
                .trim()
                .trim_end_matches(';')
                .trim_matches(|c| c == '"' || c == '`')
                .to_string()
        })
        .filter(|column| !column.is_empty())
        .collect()
}

/// Indexes, in schema order, of the columns named in `group_by`.
pub fn grouping_column_indices(columns: &[ColumnSchema], group_by: &[String]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, column)| group_by.iter().any(|g| g == &column.name))
        .map(|(index, _)| index)
        .collect()
}

/// `name:value;` for every grouping column. A number and a string with the
/// same text give the same key and end up in the same series.
pub fn series_key(columns: &[ColumnSchema], row: &[Value], grouping: &[usize]) -> String {
    let mut key = String::new();
    for &index in grouping {
        let value = row.get(index).unwrap_or(&Value::Null);
        key.push_str(&format!("{}:{};", columns[index].name, value_to_js_string(value)));
    }
    key
}

/// One frame per distinct series key, in order of first appearance. Rows that
/// can't produce a key are left out.
pub fn split_into_series(
    result_set: ResultSet<'_>,
    grouping: &[usize],
    ref_id: Option<String>,
) -> Vec<ResultFrame> {
    let column_count = result_set.columns.len();
    let mut series: IndexMap<String, Vec<&Value>> = IndexMap::new();
    for (row_index, row) in result_set.rows.iter().enumerate() {
        let Some(values) = well_formed_row(row, column_count) else {
            error!("Row {row_index} does not have {column_count} values. Skipping row.");
            continue;
        };
        let key = series_key(result_set.columns, values, grouping);
        series.entry(key).or_default().push(row);
    }
    debug!("Split {} rows into {} series", result_set.rows.len(), series.len());

    let plans = ColumnPlan::for_columns(result_set.columns);
    series
        .into_iter()
        .map(|(key, rows)| {
            let columns = transpose_rows(&plans, rows.iter().copied());
            let mut frame = ResultFrame::new(Some(key.clone()), ref_id.clone());
            for mut field in fields_from_columns(&plans, columns) {
                field.config.display_name = Some(format!("{}_{}", field.name, key));
                frame.push_field(field);
            }
            frame.length = rows.len();
            frame
        })
        .collect()
}
