use serde_json::{Map, Value};

/// One input line after parsing.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    /// The line was a JSON object.
    Structured(Map<String, Value>),
    /// The line could not be parsed; carries the raw text.
    Raw(String),
}

impl Record {
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Record::Structured(fields) => fields.get(key),
            Record::Raw(_) => None,
        }
    }
}

/// A single event ready to be appended to a log stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp_ms: i64,
    pub message: String,
    pub stream_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSequenceToken {
    pub stream_name: String,
    pub token: Option<String>,
}
