use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::model::LogEvent;
use crate::sequence::SequenceTokenManager;
use crate::store::{InputLogEvent, LogStore, RejectedLogEventsInfo, rejection_details};

/// What happened to one event.
#[derive(Debug)]
pub enum Delivery {
    Accepted,
    /// The store answered but refused the event (outside its time window).
    Rejected(RejectedLogEventsInfo),
    /// The request never succeeded: credentials, throttling, stale token, network.
    Failed(StoreError),
}

pub struct Uploader<S> {
    store: S,
    log_group: String,
    tokens: SequenceTokenManager,
}

impl<S: LogStore> Uploader<S> {
    pub fn new(store: S, log_group: impl Into<String>, tokens: SequenceTokenManager) -> Self {
        Self {
            store,
            log_group: log_group.into(),
            tokens,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetches the stream's sequence token and appends a single event with it.
    pub fn deliver(&mut self, event: &LogEvent) -> Delivery {
        let stream = event.stream_name.as_str();
        debug!(
            "about to send message to {}/{stream} - {:?}",
            self.log_group, event.message
        );

        let result = self
            .tokens
            .next_token(&mut self.store, &self.log_group, stream)
            .and_then(|token| {
                self.store.append_event(
                    &self.log_group,
                    stream,
                    &token,
                    &InputLogEvent {
                        timestamp: event.timestamp_ms,
                        message: event.message.clone(),
                    },
                )
            });

        match result {
            Ok(response) => match response.rejected {
                Some(rejected) => {
                    self.tokens.invalidate(stream);
                    warn!(stream, "failed sending event: {:?}", event.message);
                    for (key, value) in rejection_details(&rejected) {
                        warn!(stream, "rejectedLogEventsInfo {key} -> {value}");
                    }
                    Delivery::Rejected(rejected)
                }
                None => {
                    self.tokens
                        .record_accepted(stream, response.next_sequence_token);
                    Delivery::Accepted
                }
            },
            Err(err) => {
                self.tokens.invalidate(stream);
                if err.is_stale_token() {
                    warn!(stream, "sequence token rejected, next line will look it up again");
                }
                error!(stream, code = ?err.code(), "ERROR sending message to CloudWatch - {err}");
                Delivery::Failed(err)
            }
        }
    }
}
