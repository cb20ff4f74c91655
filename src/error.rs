use std::error::Error;
use std::fmt::Debug;

use aws_sdk_cloudwatchlogs::error::{
    BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError,
};
use thiserror::Error;

/// Errors from the log store. None of these are fatal; the line is simply not acknowledged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{code}: {message}")]
    Service { code: String, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("invalid request: {0}")]
    Build(#[from] BuildError),
}

impl StoreError {
    pub fn code(&self) -> Option<&str> {
        match self {
            StoreError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// True when the store no longer agrees with the token we sent.
    pub fn is_stale_token(&self) -> bool {
        matches!(
            self.code(),
            Some("InvalidSequenceTokenException" | "DataAlreadyAcceptedException")
        )
    }

    pub fn is_already_exists(&self) -> bool {
        self.code() == Some("ResourceAlreadyExistsException")
    }
}

impl<E, R> From<SdkError<E, R>> for StoreError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    fn from(err: SdkError<E, R>) -> Self {
        match &err {
            SdkError::ServiceError(service) => match service.err().code() {
                Some(code) => StoreError::Service {
                    code: code.to_string(),
                    message: service.err().message().unwrap_or_default().to_string(),
                },
                None => StoreError::Transport(DisplayErrorContext(&err).to_string()),
            },
            _ => StoreError::Transport(DisplayErrorContext(&err).to_string()),
        }
    }
}
