use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::StreamSequenceToken;
use crate::store::LogStore;

/// Token the store expects for the first append to a stream.
pub const INITIAL_SEQUENCE_TOKEN: &str = "0";

/// Finds the token for the next append to a stream.
///
/// By default the store is asked before every append. With caching enabled the token
/// returned by the previous accepted append is reused until a delivery to that stream fails.
#[derive(Debug, Default)]
pub struct SequenceTokenManager {
    cache: Option<HashMap<String, String>>,
}

impl SequenceTokenManager {
    pub fn new(cache_tokens: bool) -> Self {
        Self {
            cache: cache_tokens.then(HashMap::new),
        }
    }

    pub fn next_token<S: LogStore>(
        &mut self,
        store: &mut S,
        group: &str,
        stream: &str,
    ) -> Result<String, StoreError> {
        if let Some(token) = self.cache.as_ref().and_then(|c| c.get(stream)) {
            debug!(stream, "using cached sequence token");
            return Ok(token.clone());
        }

        match find_stream(store, group, stream)? {
            Some(found) => Ok(found
                .token
                .unwrap_or_else(|| INITIAL_SEQUENCE_TOKEN.to_string())),
            None => {
                match store.create_stream(group, stream) {
                    Ok(()) => info!(stream, "created log stream"),
                    Err(err) if err.is_already_exists() => {
                        debug!(stream, "log stream was created concurrently")
                    }
                    Err(err) => return Err(err),
                }
                Ok(INITIAL_SEQUENCE_TOKEN.to_string())
            }
        }
    }

    pub fn record_accepted(&mut self, stream: &str, next_token: Option<String>) {
        if let Some(cache) = self.cache.as_mut() {
            match next_token {
                Some(token) => {
                    cache.insert(stream.to_string(), token);
                }
                None => {
                    cache.remove(stream);
                }
            }
        }
    }

    pub fn invalidate(&mut self, stream: &str) {
        if let Some(cache) = self.cache.as_mut() {
            cache.remove(stream);
        }
    }
}

/// The store matches on prefix, so `web` would also return `web-2`; only an exact name counts.
fn find_stream<S: LogStore>(
    store: &mut S,
    group: &str,
    stream: &str,
) -> Result<Option<StreamSequenceToken>, StoreError> {
    Ok(store
        .lookup_streams(group, stream)?
        .into_iter()
        .find(|s| s.stream_name == stream))
}
