use crate::error::TraceError;
use crate::logs::{transform_logs, LogOptions};
use crate::promql::{transform_promql, PromQuery, PromResponse};
use crate::traces::transform_trace_details;
use crate::transpose::{transform_response_value, TransformOptions};
use backtraced_error::SerdeJsonError;
use frame_structs::builder::QueryBuilderOptions;
use frame_structs::frame::ResultFrame;
use frame_structs::response::GreptimeResponse;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, instrument};
use tracing_config_helper::{LogFormat, LoggingConfig, LoggingSetupError};

const SQL_CHARS_IN_DEBUG: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Tables and time series, split per series for GROUP BY queries.
    Table,
    Logs,
    Trace,
    Promql,
}

#[derive(clap::Parser)]
#[clap(about = "Converts GreptimeDB JSON responses into frames")]
pub struct LaunchConfig {
    #[clap(long, env, value_enum, default_value_t = Mode::Table)]
    pub mode: Mode,
    /// Response file, stdin when absent.
    #[clap(long, env)]
    pub input: Option<PathBuf>,
    /// Query the response answers, used to split GROUP BY results into series.
    #[clap(long, env)]
    pub sql: Option<String>,
    #[clap(long, env)]
    pub ref_id: Option<String>,
    #[clap(long, env, value_delimiter = ',')]
    pub context_columns: Vec<String>,
    /// JSON file with the query builder columns, their hints and log aliases.
    #[clap(long, env)]
    pub builder_options: Option<PathBuf>,
    #[clap(long, env, default_value = "")]
    pub expr: String,
    #[clap(long, env, default_value = "")]
    pub legend_format: String,
    #[clap(long, env, default_value_t = 15_000)]
    pub step_ms: i64,
    #[clap(long, env, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Debug for LaunchConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchConfig")
            .field("mode", &self.mode)
            .field("input", &self.input)
            .field(
                "sql",
                &self
                    .sql
                    .as_ref()
                    .map(|sql| sql.chars().take(SQL_CHARS_IN_DEBUG).collect::<String>()),
            )
            .field("ref_id", &self.ref_id)
            .field("context_columns", &self.context_columns)
            .field("builder_options", &self.builder_options)
            .field("expr", &self.expr)
            .field("legend_format", &self.legend_format)
            .field("step_ms", &self.step_ms)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl LaunchConfig {
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            format: self.log_format,
            ..LoggingConfig::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read {what} from {from}")]
    Read {
        what: &'static str,
        from: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {what}")]
    Parse {
        what: &'static str,
        #[source]
        source: SerdeJsonError,
    },
    #[error("Failed to build trace frames")]
    Trace(#[from] TraceError),
    #[error("Failed to serialize frames")]
    Serialize(#[source] serde_json::Error),
    #[error("Failed to set up logging")]
    Logging(#[from] LoggingSetupError),
}

pub fn read_input(path: Option<&PathBuf>) -> Result<String, CliError> {
    let mut input = String::new();
    match path {
        Some(path) => {
            input = std::fs::read_to_string(path).map_err(|source| CliError::Read {
                what: "input",
                from: path.display().to_string(),
                source,
            })?;
        }
        None => {
            std::io::stdin()
                .read_to_string(&mut input)
                .map_err(|source| CliError::Read {
                    what: "input",
                    from: "stdin".to_string(),
                    source,
                })?;
        }
    }
    Ok(input)
}

fn parse_json<T: DeserializeOwned>(what: &'static str, text: &str) -> Result<T, CliError> {
    serde_json::from_str(text).map_err(|e| CliError::Parse {
        what,
        source: SerdeJsonError::with_input_sample(e, format!("Parsing {what}"), text),
    })
}

/// Builder options file plus the context columns given on the command line.
pub fn load_builder_options(config: &LaunchConfig) -> Result<QueryBuilderOptions, CliError> {
    let mut options = match &config.builder_options {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
                what: "builder options",
                from: path.display().to_string(),
                source,
            })?;
            parse_json::<QueryBuilderOptions>("builder options", &text)?
        }
        None => QueryBuilderOptions::default(),
    };
    for column in &config.context_columns {
        if !options.context_columns.contains(column) {
            options.context_columns.push(column.clone());
        }
    }
    Ok(options)
}

/// Frames for `input` according to the configured mode.
#[instrument(skip_all, fields(mode = ?config.mode))]
pub fn run(config: &LaunchConfig, input: &str) -> Result<Vec<ResultFrame>, CliError> {
    let builder_options = load_builder_options(config)?;
    let frames = match config.mode {
        Mode::Table => {
            let response = parse_json::<Value>("GreptimeDB response", input)?;
            let options = TransformOptions {
                ref_id: config.ref_id.clone(),
                sql: config.sql.clone(),
            };
            transform_response_value(&response, &options)
        }
        Mode::Logs => {
            let response = parse_json::<GreptimeResponse>("GreptimeDB response", input)?;
            let options = LogOptions {
                aliases: builder_options.log_aliases.clone().unwrap_or_default(),
                context_columns: builder_options.context_columns.clone(),
                ref_id: config.ref_id.clone(),
            };
            match (transform_logs(&response, &options), &response.error) {
                (Some(frame), _) => vec![frame],
                (None, Some(message)) => vec![ResultFrame::error(message.as_str(), config.ref_id.clone())],
                (None, None) => vec![],
            }
        }
        Mode::Trace => {
            let response = parse_json::<GreptimeResponse>("GreptimeDB response", input)?;
            transform_trace_details(&response, &builder_options)?
        }
        Mode::Promql => {
            let response = parse_json::<PromResponse>("PromQL response", input)?;
            let query = PromQuery {
                expr: config.expr.clone(),
                legend_format: config.legend_format.clone(),
                step_ms: config.step_ms,
                ref_id: config.ref_id.clone(),
            };
            transform_promql(&response, &query)
        }
    };
    info!("Produced {} frames", frames.len());
    Ok(frames)
}

pub fn frames_to_json(frames: &[ResultFrame]) -> Result<String, CliError> {
    serde_json::to_string_pretty(frames).map_err(CliError::Serialize)
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    fn config(args: &[&str]) -> LaunchConfig {
        let mut argv = vec!["greptime-frames"];
        argv.extend_from_slice(args);
        LaunchConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn table_mode_splits_group_by() {
        let config = config(&["--mode", "table", "--sql", "select * from t group by a", "--ref-id", "A"]);
        let input = json!({
            "code": 0,
            "output": [{"records": {
                "schema": {"column_schemas": [
                    {"name": "a", "data_type": "Int64"},
                    {"name": "b", "data_type": "Int64"}
                ]},
                "rows": [[1, 10], [2, 20]]
            }}]
        })
        .to_string();
        let frames = run(&config, &input).unwrap();
        assert_eq!(frames.len(), 2);
        let serialized = frames_to_json(&frames).unwrap();
        assert!(serialized.contains("\"refId\": \"A\""));
    }

    #[test]
    fn logs_mode_uses_context_columns() {
        let config = config(&["--mode", "logs", "--context-columns", "host,pod"]);
        let input = json!({
            "code": 0,
            "output": [{"records": {
                "schema": {"column_schemas": [
                    {"name": "timestamp", "data_type": "TimestampMillisecond"},
                    {"name": "body", "data_type": "String"},
                    {"name": "host", "data_type": "String"}
                ]},
                "rows": [[1, "hello", "web-1"]]
            }}]
        })
        .to_string();
        let frames = run(&config, &input).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].field("host").is_some());
    }

    #[test]
    fn logs_mode_reports_database_error() {
        let config = config(&["--mode", "logs"]);
        let frames = run(&config, r#"{"code": 1004, "error": "Table not found"}"#).unwrap();
        assert_eq!(frames[0].fields[0].values, vec![Some(json!("Table not found"))]);
    }

    #[test]
    fn trace_mode_fails_on_bad_events() {
        let config = config(&["--mode", "trace"]);
        let input = json!({
            "code": 0,
            "output": [{"records": {
                "schema": {"column_schemas": [{"name": "span_events", "data_type": "String"}]},
                "rows": [["{invalid"]]
            }}]
        })
        .to_string();
        let err = run(&config, &input).unwrap_err();
        assert!(matches!(err, CliError::Trace(_)));
    }

    #[test]
    fn promql_mode_names_series() {
        let config = config(&["--mode", "promql", "--expr", "up", "--legend-format", "{{job}}"]);
        let input = json!({
            "status": "success",
            "data": {"resultType": "vector", "result": [{"metric": {"job": "api"}, "value": [1, "1"]}]}
        })
        .to_string();
        let frames = run(&config, &input).unwrap();
        assert_eq!(frames[0].name.as_deref(), Some("api"));
    }

    #[test]
    fn unparsable_input_keeps_a_sample() {
        let config = config(&["--mode", "trace"]);
        let err = run(&config, "not json").unwrap_err();
        let CliError::Parse { source, .. } = &err else {
            panic!("expected a parse error, got {err:?}");
        };
        assert_eq!(source.bad_input_sample, "not json");
    }

    #[test]
    fn debug_shortens_sql() {
        let long_sql = format!("SELECT {} FROM t", "a, ".repeat(100));
        let config = config(&["--sql", long_sql.as_str()]);
        let debug = format!("{config:?}");
        assert!(!debug.contains("FROM t"));
    }
}
