use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MILLIS_IN_1_SEC: f64 = 1_000.0;
pub const MICROS_IN_1_MS: f64 = 1_000.0;
pub const NANOS_IN_1_MS: f64 = 1_000_000.0;

/// Unit of a GreptimeDB timestamp column, spelled out in its `data_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 4] = [
        TimeUnit::Second,
        TimeUnit::Millisecond,
        TimeUnit::Microsecond,
        TimeUnit::Nanosecond,
    ];

    /// `TimestampSecond`, `TimestampMillisecond`, ... Anything else, including
    /// `Date` and `DateTime`, has no known unit.
    pub fn from_declared_type(declared_type: &str) -> Option<Self> {
        match declared_type.trim().to_lowercase().as_str() {
            "timestampsecond" => Some(Self::Second),
            "timestampmillisecond" => Some(Self::Millisecond),
            "timestampmicrosecond" => Some(Self::Microsecond),
            "timestampnanosecond" => Some(Self::Nanosecond),
            _ => None,
        }
    }
}

pub fn to_millis(value: f64, unit: TimeUnit) -> f64 {
    match unit {
        TimeUnit::Second => value * MILLIS_IN_1_SEC,
        TimeUnit::Millisecond => value,
        TimeUnit::Microsecond => value / MICROS_IN_1_MS,
        TimeUnit::Nanosecond => value / NANOS_IN_1_MS,
    }
}

pub fn from_millis(millis: f64, unit: TimeUnit) -> f64 {
    match unit {
        TimeUnit::Second => millis / MILLIS_IN_1_SEC,
        TimeUnit::Millisecond => millis,
        TimeUnit::Microsecond => millis * MICROS_IN_1_MS,
        TimeUnit::Nanosecond => millis * NANOS_IN_1_MS,
    }
}

/// Integral results stay JSON integers so `1700000000 s` becomes
/// `1700000000000`, not `1700000000000.0`. Non finite values become `null`.
pub fn millis_to_json(millis: f64) -> Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if millis.fract() == 0.0 && millis.abs() <= MAX_SAFE_INTEGER {
        return Value::from(millis as i64);
    }
    serde_json::Number::from_f64(millis)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Milliseconds since epoch of a date-like value, truncated to whole
/// milliseconds. Numbers are taken as milliseconds already, strings are parsed
/// as RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (UTC) or `YYYY-MM-DD`.
pub fn date_value_to_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            let millis = n.as_f64()?;
            millis.is_finite().then(|| millis.trunc() as i64)
        }
        Value::String(s) => parse_date_millis(s),
        _ => None,
    }
}

pub fn parse_date_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.timestamp_millis());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}
