use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use aws_config::imds;
use tracing::info;

use crate::args::Args;
use crate::metadata::{self, region_from_availability_zone};

/// Everything the pipeline needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_group: String,
    /// Identifies this forwarder in diagnostics; events go to per-host streams.
    pub log_stream: String,
    pub region: String,
    /// Overrides the regional CloudWatch Logs endpoint.
    pub endpoint: Option<String>,
    /// Shared by region discovery and instance-profile credentials.
    pub metadata: imds::Client,
    pub timeout: Duration,
    pub cache_sequence_tokens: bool,
    pub confirm_startup: bool,
}

impl Config {
    pub async fn resolve(args: Args) -> Result<Self> {
        let from_env = env::var("AWS_REGION")
            .or_else(|_| env::var("AWS_DEFAULT_REGION"))
            .ok();
        Self::resolve_with(args, from_env).await
    }

    /// Region precedence: `--region`, then `fallback_region`, then instance metadata.
    pub async fn resolve_with(args: Args, fallback_region: Option<String>) -> Result<Self> {
        let timeout = Duration::from_secs(args.timeout_secs);
        let metadata = metadata::client(&args.metadata_endpoint, timeout)
            .context("building instance metadata client")?;
        let configured = args
            .region
            .or(fallback_region)
            .filter(|region| !region.is_empty());
        let region = match configured {
            Some(region) => region,
            None => discover_region(&metadata).await?,
        };

        Ok(Self {
            log_group: args.log_group,
            log_stream: args.log_stream,
            region,
            endpoint: args.endpoint,
            metadata,
            timeout,
            cache_sequence_tokens: args.cache_sequence_tokens,
            confirm_startup: args.confirm_startup,
        })
    }
}

pub async fn discover_region(metadata: &imds::Client) -> Result<String> {
    let zone = metadata::availability_zone(metadata).await?;
    let region = region_from_availability_zone(&zone)
        .with_context(|| format!("cannot derive a region from availability zone {zone:?}"))?;
    info!(%zone, %region, "discovered region");
    Ok(region)
}
