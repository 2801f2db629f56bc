//! What the query builder tells us about the columns it asked for.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnHint {
    Time,
    LogLevel,
    LogMessage,
    LogId,
    TraceId,
    TraceSpanId,
    TraceParentSpanId,
    TraceServiceName,
    TraceOperationName,
    TraceStartTime,
    TraceDurationTime,
    TraceTags,
    TraceServiceTags,
    TraceEvents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderColumn {
    pub name: String,
    #[serde(default)]
    pub hint: Option<ColumnHint>,
    #[serde(default)]
    pub alias: Option<String>,
}

impl BuilderColumn {
    pub fn new<S: Into<String>>(name: S, hint: Option<ColumnHint>) -> Self {
        Self {
            name: name.into(),
            hint,
            alias: None,
        }
    }

    /// Name the column will have in the result set.
    pub fn output_name(&self) -> &str {
        self.alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .unwrap_or(&self.name)
    }

    /// The result set may carry either the source name or the alias.
    pub fn matches(&self, column_name: &str) -> bool {
        self.name == column_name || self.alias.as_deref() == Some(column_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBuilderOptions {
    #[serde(default)]
    pub columns: Vec<BuilderColumn>,
    #[serde(default)]
    pub log_aliases: Option<LogColumnAliases>,
    #[serde(default)]
    pub context_columns: Vec<String>,
}

impl QueryBuilderOptions {
    pub fn columns_by_hint(&self, hint: ColumnHint) -> impl Iterator<Item = &BuilderColumn> {
        self.columns
            .iter()
            .filter(move |column| column.hint == Some(hint))
    }

    pub fn column_by_hint(&self, hint: ColumnHint) -> Option<&BuilderColumn> {
        self.columns_by_hint(hint).next()
    }
}

/// Lowercase column name the log query aliases each hinted column to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogColumnAliases(pub HashMap<ColumnHint, String>);

impl Default for LogColumnAliases {
    fn default() -> Self {
        Self(HashMap::from([
            (ColumnHint::Time, "timestamp".to_string()),
            (ColumnHint::LogLevel, "level".to_string()),
            (ColumnHint::LogMessage, "body".to_string()),
        ]))
    }
}

impl LogColumnAliases {
    pub fn alias(&self, hint: ColumnHint) -> Option<&str> {
        self.0.get(&hint).map(String::as_str)
    }

    pub fn with_alias<S: Into<String>>(mut self, hint: ColumnHint, alias: S) -> Self {
        self.0.insert(hint, alias.into().to_lowercase());
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_options_deserialize() {
        let options: QueryBuilderOptions = serde_json::from_value(json!({
            "columns": [
                {"name": "trace_id", "hint": "trace_id"},
                {"name": "span_attributes.http.method", "hint": "trace_tags", "alias": "method"},
                {"name": "other"}
            ],
            "logAliases": {"time": "ts", "log_message": "msg"},
            "contextColumns": ["host"]
        }))
        .unwrap();
        assert_eq!(options.columns.len(), 3);
        assert_eq!(
            options.column_by_hint(ColumnHint::TraceId).map(|c| c.name.as_str()),
            Some("trace_id")
        );
        let tag = options.column_by_hint(ColumnHint::TraceTags).unwrap();
        assert_eq!(tag.output_name(), "method");
        assert!(tag.matches("method"));
        assert!(tag.matches("span_attributes.http.method"));
        let aliases = options.log_aliases.unwrap();
        assert_eq!(aliases.alias(ColumnHint::Time), Some("ts"));
        assert_eq!(aliases.alias(ColumnHint::LogLevel), None);
        assert_eq!(options.context_columns, vec!["host".to_string()]);
    }

    #[test]
    fn default_log_aliases() {
        let aliases = LogColumnAliases::default();
        assert_eq!(aliases.alias(ColumnHint::Time), Some("timestamp"));
        assert_eq!(aliases.alias(ColumnHint::LogLevel), Some("level"));
        assert_eq!(aliases.alias(ColumnHint::LogMessage), Some("body"));
        assert_eq!(aliases.alias(ColumnHint::LogId), None);
        let aliases = aliases.with_alias(ColumnHint::LogId, "TraceID");
        assert_eq!(aliases.alias(ColumnHint::LogId), Some("traceid"));
    }
}
