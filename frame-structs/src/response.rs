//! Shape of the GreptimeDB `/v1/sql` JSON response.
//!
//! Every level is optional so that a response missing parts of its envelope
//! still deserializes and can be reported instead of rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GreptimeResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub output: Option<Vec<Output>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(default)]
    pub records: Option<Records>,
    /// Present instead of `records` for statements that don't return rows.
    #[serde(default)]
    pub affectedrows: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Records {
    #[serde(default)]
    pub schema: Option<Schema>,
    /// Kept as raw values, a row that is not an array is reported, not rejected.
    #[serde(default)]
    pub rows: Option<Vec<Value>>,
    #[serde(default)]
    pub total_rows: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub column_schemas: Option<Vec<ColumnSchema>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl ColumnSchema {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, data_type: T) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type.into()),
        }
    }
}

/// One statement's schema and rows, borrowed from the response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultSet<'a> {
    pub columns: &'a [ColumnSchema],
    pub rows: &'a [Value],
}

impl<'a> ResultSet<'a> {
    pub fn new(columns: &'a [ColumnSchema], rows: &'a [Value]) -> Self {
        Self { columns, rows }
    }
}

impl Output {
    /// `None` when `records`, `schema`, `column_schemas` or `rows` is missing.
    pub fn result_set(&self) -> Option<ResultSet<'_>> {
        let records = self.records.as_ref()?;
        let columns = records.schema.as_ref()?.column_schemas.as_deref()?;
        let rows = records.rows.as_deref()?;
        Some(ResultSet { columns, rows })
    }
}

impl GreptimeResponse {
    pub fn first_output(&self) -> Option<&Output> {
        self.output.as_ref()?.first()
    }
}
