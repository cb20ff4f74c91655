use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use aws_config::imds;
use regex::Regex;

pub const DEFAULT_METADATA_ENDPOINT: &str = "http://169.254.169.254";

const AVAILABILITY_ZONE_PATH: &str = "/latest/meta-data/placement/availability-zone";

static ZONE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+-\d)[a-z]$").expect("static regex"));

/// Instance metadata client. It holds the IMDSv2 session token and renews it on expiry.
pub fn client(endpoint: &str, timeout: Duration) -> Result<imds::Client> {
    let builder = imds::Client::builder()
        .endpoint(endpoint)
        .map_err(|err| anyhow!("invalid metadata endpoint {endpoint:?}: {err}"))?;
    Ok(builder
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build())
}

pub async fn availability_zone(client: &imds::Client) -> Result<String> {
    let zone = client
        .get(AVAILABILITY_ZONE_PATH)
        .await
        .context("querying availability zone from instance metadata")?;
    let zone: &str = zone.as_ref();
    Ok(zone.trim().to_string())
}

/// `us-east-1a` -> `us-east-1`.
pub fn region_from_availability_zone(zone: &str) -> Option<String> {
    ZONE_SUFFIX
        .captures(zone.trim())
        .map(|caps| caps[1].to_string())
}
