//! Lenient conversions from loosely typed JSON values.
//!
//! Every helper returns `None` when the value cannot be read as the requested
//! type; callers pick the fallback.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Reads a finite number. Numeric strings are parsed and booleans count as
/// 1 or 0.
pub fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn number_or_zero(value: Option<&Value>) -> f64 {
    number(value).unwrap_or(0.0)
}

/// Reads a non-negative whole count, rounding fractional input.
pub fn count(value: Option<&Value>) -> Option<u32> {
    let n = number(value)?;
    Some(n.max(0.0).round().min(u32::MAX as f64) as u32)
}

pub fn string(value: Option<&Value>) -> Option<String> {
    value?.as_str().map(str::to_string)
}

/// Reads an array of strings, skipping non-string items.
pub fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
    )
}

/// Reads an identifier. Legacy documents used numeric ids.
pub fn id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a point in time from an RFC 3339 string, a naive ISO timestamp
/// (assumed UTC) or epoch milliseconds.
///
/// Instants outside years 1 to 9999 are rejected: RFC 3339 cannot write them.
pub fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    parse_timestamp(value?).filter(|dt| (1..=9999).contains(&dt.year()))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(naive.and_utc());
            }
            s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
        }
        Value::Number(n) => {
            let ms = n.as_f64().filter(|ms| ms.is_finite())?;
            DateTime::from_timestamp_millis(ms as i64)
        }
        _ => None,
    }
}

/// Parses a `log` key as a calendar date. Full timestamps are accepted and
/// truncated to their date part.
pub fn date_key(key: &str) -> Option<NaiveDate> {
    let key = key.trim();
    if let Ok(date) = NaiveDate::parse_from_str(key, "%Y-%m-%d") {
        return Some(date);
    }
    if key.len() > 10 && key.is_char_boundary(10) {
        return NaiveDate::parse_from_str(&key[..10], "%Y-%m-%d").ok();
    }
    None
}
