use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Forward rsyslog omprog JSON messages to CloudWatch Logs"
)]
pub struct Args {
    /// Name of the CloudWatch log group
    #[arg(long, env = "CW_LOG_GROUP")]
    pub log_group: String,

    /// Name of the CloudWatch log stream this forwarder reports as
    #[arg(long, env = "CW_LOG_STREAM")]
    pub log_stream: String,

    /// File to append debug output to
    #[arg(long)]
    pub debug_file: Option<PathBuf>,

    /// AWS region; AWS_REGION, AWS_DEFAULT_REGION and instance metadata are tried in turn
    #[arg(long)]
    pub region: Option<String>,

    /// CloudWatch Logs endpoint, defaults to the regional one
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Instance metadata service base URL
    #[arg(long, default_value = crate::metadata::DEFAULT_METADATA_ENDPOINT)]
    pub metadata_endpoint: String,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Reuse the sequence token returned by the last append to a stream
    #[arg(long)]
    pub cache_sequence_tokens: bool,

    /// Write one OK at startup, for rsyslog's confirmMessages handshake
    #[arg(long)]
    pub confirm_startup: bool,

    /// Level for stderr diagnostics when no debug file is given
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}
