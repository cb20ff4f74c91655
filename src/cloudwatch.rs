//! CloudWatch Logs through the AWS SDK, driven one call at a time from the sequential pipeline.

use std::time::Duration;

use anyhow::{Context, Result};
use aws_config::environment::credentials::EnvironmentVariableCredentialsProvider;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::meta::credentials::CredentialsProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_cloudwatchlogs::Client;
use aws_sdk_cloudwatchlogs::config::Builder as ClientConfigBuilder;
use aws_sdk_cloudwatchlogs::config::{retry::RetryConfig, timeout::TimeoutConfig};
use aws_sdk_cloudwatchlogs::types::InputLogEvent as SdkLogEvent;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::config::Config;
use crate::error::StoreError;
use crate::model::StreamSequenceToken;
use crate::store::{AppendResponse, InputLogEvent, LogStore};

/// Environment variables first, then the instance profile role.
fn credentials_chain(config: &Config) -> CredentialsProviderChain {
    CredentialsProviderChain::first_try("Environment", EnvironmentVariableCredentialsProvider::new())
        .or_else(
            "Ec2InstanceMetadata",
            ImdsCredentialsProvider::builder()
                .imds_client(config.metadata.clone())
                .build(),
        )
}

/// Builds the CloudWatch Logs client. Credentials are resolved once here so that a host
/// without any credential source fails at startup rather than on the first line.
pub async fn connect(config: &Config) -> Result<Client> {
    let credentials = credentials_chain(config);
    credentials
        .provide_credentials()
        .await
        .context("loading AWS credentials")?;

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials);
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let sdk_config = loader.load().await;

    Ok(finish(ClientConfigBuilder::from(&sdk_config), config.timeout))
}

/// The feeder redelivers anything we fail to acknowledge, so the SDK must not retry on its own.
fn finish(builder: ClientConfigBuilder, timeout: Duration) -> Client {
    Client::from_conf(
        builder
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .build(),
            )
            .retry_config(RetryConfig::disabled())
            .build(),
    )
}

/// [`LogStore`] backed by CloudWatch Logs.
///
/// Owns a current-thread runtime and blocks on each call, so lines are still handled
/// strictly one after another.
pub struct CloudWatchStore {
    client: Client,
    runtime: Runtime,
}

impl CloudWatchStore {
    pub fn new(client: Client, runtime: Runtime) -> Self {
        Self { client, runtime }
    }
}

impl LogStore for CloudWatchStore {
    fn lookup_streams(&mut self, group: &str, name: &str) -> Result<Vec<StreamSequenceToken>, StoreError> {
        let client = &self.client;
        self.runtime.block_on(async move {
            let mut pages = client
                .describe_log_streams()
                .log_group_name(group)
                .log_stream_name_prefix(name)
                .into_paginator()
                .send();

            let mut streams = Vec::new();
            while let Some(page) = pages.next().await {
                let page = page?;
                streams.extend(page.log_streams().iter().filter_map(|stream| {
                    Some(StreamSequenceToken {
                        stream_name: stream.log_stream_name()?.to_string(),
                        token: stream.upload_sequence_token().map(str::to_string),
                    })
                }));
                if streams.iter().any(|s| s.stream_name == name) {
                    break;
                }
            }
            debug!(group, name, found = streams.len(), "described log streams");
            Ok(streams)
        })
    }

    fn create_stream(&mut self, group: &str, name: &str) -> Result<(), StoreError> {
        let request = self
            .client
            .create_log_stream()
            .log_group_name(group)
            .log_stream_name(name);
        self.runtime.block_on(request.send())?;
        Ok(())
    }

    fn append_event(
        &mut self,
        group: &str,
        name: &str,
        sequence_token: &str,
        event: &InputLogEvent,
    ) -> Result<AppendResponse, StoreError> {
        let event = SdkLogEvent::builder()
            .timestamp(event.timestamp)
            .message(event.message.as_str())
            .build()?;
        let request = self
            .client
            .put_log_events()
            .log_group_name(group)
            .log_stream_name(name)
            .log_events(event)
            .sequence_token(sequence_token);
        let response = self.runtime.block_on(request.send())?;

        Ok(AppendResponse {
            next_sequence_token: response.next_sequence_token().map(str::to_string),
            rejected: response.rejected_log_events_info().cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use aws_sdk_cloudwatchlogs::config::Credentials;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tokio::runtime::Builder;

    use super::*;
    use crate::protocol::ProtocolAdapter;
    use crate::sequence::SequenceTokenManager;
    use crate::uploader::Uploader;

    fn store(server: &Server) -> CloudWatchStore {
        let builder = aws_sdk_cloudwatchlogs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new(
                "AKIDTEST",
                "secret",
                Some("session".into()),
                None,
                "test",
            ))
            .endpoint_url(server.url());
        let runtime = Builder::new_current_thread().enable_all().build().unwrap();
        CloudWatchStore::new(finish(builder, Duration::from_secs(5)), runtime)
    }

    fn target(action: &str) -> Matcher {
        Matcher::Exact(format!("Logs_20140328.{action}"))
    }

    fn event(message: &str) -> InputLogEvent {
        InputLogEvent {
            timestamp: 1,
            message: message.into(),
        }
    }

    #[test]
    fn requests_are_signed() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", target("DescribeLogStreams"))
            .match_header("x-amz-security-token", "session")
            .match_header(
                "authorization",
                Matcher::Regex(
                    r"^AWS4-HMAC-SHA256 Credential=AKIDTEST/\d{8}/us-east-1/logs/aws4_request, ".into(),
                ),
            )
            .with_body(r#"{"logStreams":[]}"#)
            .create();

        assert!(store(&server).lookup_streams("g", "h1").unwrap().is_empty());
        mock.assert();
    }

    #[test]
    fn lookup_follows_pages_until_exact_match() {
        let mut server = Server::new();
        let first = server
            .mock("POST", "/")
            .match_header("x-amz-target", target("DescribeLogStreams"))
            .match_body(Matcher::Json(json!({
                "logGroupName": "g",
                "logStreamNamePrefix": "web",
            })))
            .with_body(r#"{"logStreams":[{"logStreamName":"web-a","uploadSequenceToken":"1"}],"nextToken":"page-2"}"#)
            .create();
        let second = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"nextToken": "page-2"})))
            .with_body(r#"{"logStreams":[{"logStreamName":"web","uploadSequenceToken":"42"}]}"#)
            .create();

        let streams = store(&server).lookup_streams("g", "web").unwrap();

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[1].stream_name, "web");
        assert_eq!(streams[1].token.as_deref(), Some("42"));
        first.assert();
        second.assert();
    }

    #[test]
    fn create_sends_group_and_stream() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", target("CreateLogStream"))
            .match_body(Matcher::Json(json!({"logGroupName": "g", "logStreamName": "h1"})))
            .with_body("{}")
            .create();

        store(&server).create_stream("g", "h1").unwrap();
        mock.assert();
    }

    #[test]
    fn existing_stream_on_create_is_reported_as_such() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"__type":"ResourceAlreadyExistsException","message":"The specified log stream already exists"}"#)
            .create();

        let err = store(&server).create_stream("g", "h1").unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn append_reports_rejections() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/")
            .match_header("x-amz-target", target("PutLogEvents"))
            .match_body(Matcher::Json(json!({
                "logGroupName": "g",
                "logStreamName": "h1",
                "logEvents": [{"timestamp": 1, "message": "old"}],
                "sequenceToken": "0",
            })))
            .with_body(r#"{"nextSequenceToken":"5","rejectedLogEventsInfo":{"tooOldLogEventEndIndex":0}}"#)
            .create();

        let response = store(&server).append_event("g", "h1", "0", &event("old")).unwrap();

        assert_eq!(response.next_sequence_token.as_deref(), Some("5"));
        assert_eq!(
            response.rejected.unwrap().too_old_log_event_end_index(),
            Some(0)
        );
        mock.assert();
    }

    #[test]
    fn service_errors_are_decoded() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"__type":"com.amazonaws.logs#InvalidSequenceTokenException","message":"The given sequenceToken is invalid.","expectedSequenceToken":"9"}"#)
            .create();

        let err = store(&server).append_event("g", "h1", "0", &event("x")).unwrap_err();

        assert!(err.is_stale_token());
        assert_eq!(
            err.to_string(),
            "InvalidSequenceTokenException: The given sequenceToken is invalid."
        );
    }

    #[test]
    fn unstructured_errors_are_transport_failures() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .with_body("Service Unavailable")
            .create();

        let err = store(&server).append_event("g", "h1", "0", &event("x")).unwrap_err();

        assert!(matches!(err, StoreError::Transport(_)), "{err:?}");
    }

    #[test]
    fn new_stream_end_to_end() {
        let mut server = Server::new();
        let describe = server
            .mock("POST", "/")
            .match_header("x-amz-target", target("DescribeLogStreams"))
            .with_body(r#"{"logStreams":[{"logStreamName":"h10","uploadSequenceToken":"777"}]}"#)
            .create();
        let create = server
            .mock("POST", "/")
            .match_header("x-amz-target", target("CreateLogStream"))
            .match_body(Matcher::PartialJson(json!({"logStreamName": "h1"})))
            .with_body("{}")
            .create();
        let put = server
            .mock("POST", "/")
            .match_header("x-amz-target", target("PutLogEvents"))
            .match_body(Matcher::Json(json!({
                "logGroupName": "syslog",
                "logStreamName": "h1",
                "logEvents": [{"timestamp": 1672531200000i64, "message": "hi"}],
                "sequenceToken": "0",
            })))
            .with_body(r#"{"nextSequenceToken":"1"}"#)
            .create();

        let uploader = Uploader::new(store(&server), "syslog", SequenceTokenManager::new(false));
        let mut adapter = ProtocolAdapter::new(uploader);
        let mut ack = Vec::new();
        let mut errors = Vec::new();
        adapter
            .run(
                Cursor::new(
                    br#"{"fromhost":"h1","timereported":"2023-01-01T00:00:00Z","rawmsg":"  hi  "}"#
                        .to_vec(),
                ),
                &mut ack,
                &mut errors,
            )
            .unwrap();

        assert_eq!(ack, b"OK\n");
        assert!(errors.is_empty());
        describe.assert();
        create.assert();
        put.assert();
    }

    #[test]
    fn auth_failure_is_not_acknowledged() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"__type":"UnrecognizedClientException","message":"The security token included in the request is invalid."}"#)
            .create();

        let uploader = Uploader::new(store(&server), "syslog", SequenceTokenManager::new(false));
        let mut adapter = ProtocolAdapter::new(uploader);
        let mut ack = Vec::new();
        let mut errors = Vec::new();
        let summary = adapter
            .run(Cursor::new(b"hello\n".to_vec()), &mut ack, &mut errors)
            .unwrap();

        assert!(ack.is_empty());
        assert_eq!(summary.failed, 1);
        assert_eq!(
            String::from_utf8(errors).unwrap(),
            "ERROR: UnrecognizedClientException: The security token included in the request is invalid.\n"
        );
    }
}
