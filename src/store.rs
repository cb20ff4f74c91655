use std::collections::BTreeMap;

pub use aws_sdk_cloudwatchlogs::types::RejectedLogEventsInfo;

use crate::error::StoreError;
use crate::model::StreamSequenceToken;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputLogEvent {
    pub timestamp: i64,
    pub message: String,
}

/// The rejection indexes the store reported, keyed by their wire names.
pub fn rejection_details(info: &RejectedLogEventsInfo) -> BTreeMap<&'static str, i32> {
    [
        ("tooNewLogEventStartIndex", info.too_new_log_event_start_index()),
        ("tooOldLogEventEndIndex", info.too_old_log_event_end_index()),
        ("expiredLogEventEndIndex", info.expired_log_event_end_index()),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| (key, v)))
    .collect()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppendResponse {
    pub next_sequence_token: Option<String>,
    pub rejected: Option<RejectedLogEventsInfo>,
}

/// The append-only log store, one ledger per stream inside a log group.
pub trait LogStore {
    /// Streams whose name starts with `name`. Callers must check for an exact match.
    fn lookup_streams(&mut self, group: &str, name: &str) -> Result<Vec<StreamSequenceToken>, StoreError>;

    fn create_stream(&mut self, group: &str, name: &str) -> Result<(), StoreError>;

    fn append_event(
        &mut self,
        group: &str,
        name: &str,
        sequence_token: &str,
        event: &InputLogEvent,
    ) -> Result<AppendResponse, StoreError>;
}
