//! This serves as an unified logging config for the workspace binaries.
//! Logs always go to stderr, stdout is reserved for the frames we produce.

use std::str::FromStr;
use tracing::subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown log format: {other}, expected pretty or json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Used when RUST_LOG is missing or invalid.
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingSetupError {
    #[error("Invalid default log filter {filter}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("A global subscriber was already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Uses RUST_LOG, see https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
/// on how to configure that. If not present, defaults to `config.default_filter`.
pub fn setup_logging(config: &LoggingConfig) -> Result<(), LoggingSetupError> {
    let filter = env_filter_or_default(&config.default_filter)?;
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_filter(filter)
            .boxed(),
    };
    let subscriber = Registry::default().with(layer);
    subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn env_filter_or_default(default_filter: &str) -> Result<EnvFilter, LoggingSetupError> {
    match EnvFilter::try_from_default_env() {
        Ok(env_filter) => Ok(env_filter),
        Err(_e) => EnvFilter::builder()
            .parse(default_filter)
            .map_err(|source| LoggingSetupError::InvalidFilter {
                filter: default_filter.to_string(),
                source,
            }),
    }
}

/// Compact console output for tests, safe to call from every test.
pub fn setup_tracing_console_logging_for_test() {
    let filter = env_filter_or_default("debug").unwrap_or_else(|_| EnvFilter::new("debug"));
    let fmt = tracing_subscriber::fmt::layer()
        // for tests ansi if nice
        .with_ansi(true)
        .with_test_writer()
        .compact()
        .with_filter(filter);
    let subscriber = Registry::default().with(fmt);
    // only the first test to get here installs it
    let _ = subscriber::set_global_default(subscriber);
}
