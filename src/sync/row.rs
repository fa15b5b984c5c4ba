//! Reading and building loosely typed rows at the store boundary.

use crate::store::Row;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Text column; empty or whitespace-only values read as absent.
pub fn opt_text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Text column with a fallback for absent values.
pub fn text_or(row: &Row, key: &str, default: &str) -> String {
    opt_text(row, key).unwrap_or_else(|| default.to_string())
}

/// Date column. Accepts `YYYY-MM-DD` or a full timestamp (date part kept).
pub fn opt_date(row: &Row, key: &str) -> Option<NaiveDate> {
    let raw = opt_text(row, key)?;
    let parsed = parse_date(&raw);
    if parsed.is_none() {
        warn!(column = key, value = %raw, "Ignoring malformed date");
    }
    parsed
}

/// Timestamp column. Timestamps without an offset are taken as UTC.
pub fn opt_timestamp(row: &Row, key: &str) -> Option<DateTime<Utc>> {
    let raw = opt_text(row, key)?;
    let parsed = parse_timestamp(&raw);
    if parsed.is_none() {
        warn!(column = key, value = %raw, "Ignoring malformed timestamp");
    }
    parsed
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Builds outgoing payloads containing only defined values.
#[derive(Debug, Default)]
pub struct RowBuilder {
    row: Row,
}

impl RowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always included.
    pub fn set(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.row.insert(key.to_string(), value);
        }
        self
    }

    /// Included only when present; blank strings count as absent.
    pub fn set_opt<T: Serialize>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(value) if !is_blank(&value) => self.set(key, value),
            _ => self,
        }
    }

    /// Patch field: absent is skipped, `Some(None)` writes an explicit null.
    pub fn patch<T: Serialize>(self, key: &str, value: Option<Option<T>>) -> Self {
        match value {
            None => self,
            Some(None) => self.set(key, Value::Null),
            Some(Some(value)) if is_blank(&value) => self.set(key, Value::Null),
            Some(Some(value)) => self.set(key, value),
        }
    }

    pub fn build(self) -> Row {
        self.row
    }
}

fn is_blank<T: Serialize>(value: &T) -> bool {
    matches!(serde_json::to_value(value), Ok(Value::String(s)) if s.trim().is_empty())
}
