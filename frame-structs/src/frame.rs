use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

/// A single slot of a field. `None` is a slot with no value at all (a row
/// that could not be read), `Some(Value::Null)` is a SQL `NULL`.
pub type Cell = Option<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Time,
    Number,
    Boolean,
    String,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualisationType {
    Logs,
    Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameType {
    #[serde(rename = "log-lines")]
    LogLines,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    pub display_name: Option<String>,
    pub unit: Option<String>,
    /// Expected distance between samples, in milliseconds.
    pub interval: Option<f64>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    #[serde(default)]
    pub config: FieldConfig,
    pub labels: Option<IndexMap<String, String>>,
    pub values: Vec<Cell>,
}

impl Field {
    pub fn new<N: Into<String>>(name: N, kind: ColumnKind, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            kind,
            config: FieldConfig::default(),
            labels: None,
            values,
        }
    }

    /// Every value is present, used by the log and trace frames whose columns
    /// are always built from whole records.
    pub fn from_values<N, I, V>(name: N, kind: ColumnKind, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(
            name,
            kind,
            values.into_iter().map(|v| Some(v.into())).collect(),
        )
    }

    pub fn with_display_name<S: Into<String>>(mut self, display_name: S) -> Self {
        self.config.display_name = Some(display_name.into());
        self
    }

    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.config.unit = Some(unit.into());
        self
    }

    pub fn with_labels(mut self, labels: IndexMap<String, String>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMeta {
    pub preferred_visualisation_type: Option<VisualisationType>,
    #[serde(rename = "type")]
    pub frame_type: Option<FrameType>,
    pub executed_query_string: Option<String>,
}

impl FrameMeta {
    pub fn logs() -> Self {
        Self {
            preferred_visualisation_type: Some(VisualisationType::Logs),
            frame_type: Some(FrameType::LogLines),
            executed_query_string: None,
        }
    }

    pub fn trace() -> Self {
        Self {
            preferred_visualisation_type: Some(VisualisationType::Trace),
            ..Self::default()
        }
    }
}

/// Column-major unit handed to the host: one renderable table or series.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFrame {
    pub name: Option<String>,
    pub ref_id: Option<String>,
    pub fields: Vec<Field>,
    pub length: usize,
    pub meta: Option<FrameMeta>,
}

impl ResultFrame {
    pub fn new(name: Option<String>, ref_id: Option<String>) -> Self {
        Self {
            name,
            ref_id,
            ..Self::default()
        }
    }

    /// Single string field named `Error` carrying the database message.
    pub fn error<S: Into<String>>(message: S, ref_id: Option<String>) -> Self {
        let message: String = message.into();
        let mut frame = Self::new(None, ref_id);
        frame.push_field(Field::from_values("Error", ColumnKind::String, [message]));
        frame
    }

    /// The frame length follows its longest field.
    pub fn push_field(&mut self, field: Field) {
        self.length = self.length.max(field.len());
        self.fields.push(field);
    }

    pub fn with_meta(mut self, meta: FrameMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
