use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{LogEvent, Record};

/// Stream used when a record does not name its sending host.
pub const DEFAULT_STREAM_NAME: &str = "default";

const BLANK_MESSAGE: &str = "blank message";
const HOST_CLUES: [&str; 2] = ["fromhost", "fromhost-ip"];

/// Parses one input line. Anything that is not a JSON object is kept as raw text.
pub fn parse_record(line: &str) -> Record {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(fields)) => Record::Structured(fields),
        Ok(_) => {
            debug!("line is JSON but not an object, forwarding as text");
            Record::Raw(line.to_string())
        }
        Err(err) => {
            warn!("JSON parse error: {err}");
            Record::Raw(line.to_string())
        }
    }
}

pub fn build_event(record: &Record) -> LogEvent {
    LogEvent {
        timestamp_ms: resolve_timestamp(record),
        message: extract_message(record),
        stream_name: route_stream(record),
    }
}

/// Event time in epoch milliseconds, falling back to the current time.
pub fn resolve_timestamp(record: &Record) -> i64 {
    match record.field("timereported") {
        Some(Value::String(raw)) => match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => return epoch_millis(ts.with_timezone(&Utc)),
            Err(err) => {
                warn!("could not parse date string {raw:?} ({err}), defaulting to current time")
            }
        },
        Some(other) => warn!("timereported is not a string ({other}), defaulting to current time"),
        None if matches!(record, Record::Structured(_)) => {
            debug!("record has no timereported, defaulting to current time")
        }
        None => {}
    }
    epoch_millis(Utc::now())
}

/// Truncates toward zero, so sub-millisecond precision is dropped rather than rounded.
pub fn epoch_millis(ts: DateTime<Utc>) -> i64 {
    let nanos = i128::from(ts.timestamp()) * 1_000_000_000 + i128::from(ts.timestamp_subsec_nanos());
    (nanos / 1_000_000) as i64
}

pub fn extract_message(record: &Record) -> String {
    let text = match record {
        Record::Raw(line) => line.clone(),
        Record::Structured(_) => match record.field("rawmsg") {
            Some(Value::Null) | None => String::new(),
            Some(value) => display_value(value).trim().to_string(),
        },
    };

    if text.trim().is_empty() {
        blank_message(record)
    } else {
        text
    }
}

/// The store refuses empty messages, so say which host sent one instead.
fn blank_message(record: &Record) -> String {
    let mut message = BLANK_MESSAGE.to_string();
    for key in HOST_CLUES {
        if let Some(value) = record.field(key) {
            let _ = write!(message, ", {key}={}", display_value(value));
        }
    }
    message
}

pub fn route_stream(record: &Record) -> String {
    find_str(record, "fromhost")
        .filter(|host| !host.is_empty())
        .unwrap_or(DEFAULT_STREAM_NAME)
        .to_string()
}

fn find_str<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.field(key).and_then(|v| v.as_str())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
