use frame_structs::frame::{Cell, ColumnKind};
use frame_structs::response::ColumnSchema;
use frame_structs::time_conversion::{millis_to_json, to_millis, TimeUnit};
use serde_json::Value;
use tracing::warn;

const NUMERIC_TYPES: [&str; 5] = ["int", "float", "double", "decimal", "numeric"];
const STRING_TYPES: [&str; 3] = ["string", "varchar", "text"];

/// Order matters: `timestamp` wins over everything, and a type containing both
/// a numeric and a string marker is a number.
pub fn column_kind(declared_type: Option<&str>) -> ColumnKind {
    let Some(declared_type) = declared_type.filter(|t| !t.trim().is_empty()) else {
        warn!("Column without data type, mapping it to other");
        return ColumnKind::Other;
    };
    let lower = declared_type.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if lower.contains("timestamp") {
        ColumnKind::Time
    } else if contains_any(&NUMERIC_TYPES) {
        ColumnKind::Number
    } else if lower.contains("bool") {
        ColumnKind::Boolean
    } else if contains_any(&STRING_TYPES) {
        ColumnKind::String
    } else if lower.contains("date") {
        ColumnKind::Time
    } else if lower.contains("interval") {
        ColumnKind::String
    } else {
        warn!("Unhandled GreptimeDB type: {declared_type}, mapping it to other");
        ColumnKind::Other
    }
}

/// How every cell of one column gets converted, worked out once per column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPlan {
    pub name: String,
    pub kind: ColumnKind,
    pub time_unit: Option<TimeUnit>,
}

impl ColumnPlan {
    /// `index` is only used to name columns that came without one.
    pub fn new(index: usize, schema: &ColumnSchema) -> Self {
        let kind = column_kind(schema.data_type.as_deref());
        let time_unit = match kind {
            ColumnKind::Time => {
                let unit = schema
                    .data_type
                    .as_deref()
                    .and_then(TimeUnit::from_declared_type);
                if unit.is_none() {
                    warn!(
                        "Unexpected time column type {:?} for {}, passing values through as milliseconds",
                        schema.data_type, schema.name
                    );
                }
                unit
            }
            _ => None,
        };
        let name = if schema.name.is_empty() {
            format!("column_{}", index + 1)
        } else {
            schema.name.to_string()
        };
        Self {
            name,
            kind,
            time_unit,
        }
    }

    pub fn for_columns(columns: &[ColumnSchema]) -> Vec<Self> {
        columns
            .iter()
            .enumerate()
            .map(|(index, schema)| Self::new(index, schema))
            .collect()
    }

    pub fn convert(&self, value: &Value) -> Cell {
        match self.kind {
            ColumnKind::Time => Some(normalize_time_value(value, self.time_unit)),
            _ => Some(value.clone()),
        }
    }
}

/// Numbers are scaled to milliseconds, anything else (nulls, date strings)
/// passes through untouched, as do numbers of a column with no known unit.
pub fn normalize_time_value(value: &Value, unit: Option<TimeUnit>) -> Value {
    match (value, unit) {
        (Value::Number(n), Some(unit)) => match n.as_f64() {
            Some(raw) => millis_to_json(to_millis(raw, unit)),
            None => value.clone(),
        },
        _ => value.clone(),
    }
}
