//! Posting due dates, normalized for ordering.
//!
//! Accepted forms of `due_time`: an RFC 3339 string, a naive
//! `YYYY-MM-DD[ HH:MM:SS]` string (read as UTC), or an extended-JSON date
//! (`{"$date": "<iso>"}`, `{"$date": <millis>}` or
//! `{"$date": {"$numberLong": "<millis>"}}`). Anything else sorts last.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as Json;

/// 9999-12-31T23:59:59Z as seconds since the epoch.
pub const DUE_SENTINEL_TS: i64 = 253_402_300_799;

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Due date given to postings without a parseable one.
pub fn due_sentinel() -> DateTime<Utc> {
    DateTime::from_timestamp(DUE_SENTINEL_TS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Parse a due date string; naive forms are read as UTC.
pub fn parse_due(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn from_millis(value: &Json) -> Option<DateTime<Utc>> {
    let millis = match value {
        Json::Number(n) => n.as_i64()?,
        Json::String(s) => s.trim().parse::<i64>().ok()?,
        Json::Object(o) => return from_millis(o.get("$numberLong")?),
        _ => return None,
    };
    DateTime::from_timestamp_millis(millis)
}

/// Decode a `due_time` value in any accepted form.
pub fn due_value(value: &Json) -> Option<DateTime<Utc>> {
    match value {
        Json::String(s) => parse_due(s),
        Json::Object(o) => match o.get("$date")? {
            Json::String(s) => parse_due(s),
            millis => from_millis(millis),
        },
        _ => None,
    }
}

/// The posting's due date, or the sentinel when missing or unparseable.
pub fn posting_due(doc: &Json) -> DateTime<Utc> {
    doc.get("due_time").and_then(due_value).unwrap_or_else(due_sentinel)
}

/// Seconds since the epoch for the index's fast field.
pub fn posting_due_ts(doc: &Json) -> i64 {
    posting_due(doc).timestamp().min(DUE_SENTINEL_TS)
}
