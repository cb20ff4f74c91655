mod args;
mod cloudwatch;
mod config;
mod diagnostics;
mod error;
mod input;
mod metadata;
mod model;
mod protocol;
mod sequence;
mod store;
mod uploader;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, info_span};

use crate::{
    args::Args, cloudwatch::CloudWatchStore, config::Config, protocol::ProtocolAdapter,
    sequence::SequenceTokenManager, uploader::Uploader,
};

fn main() -> Result<()> {
    let args = Args::parse();
    diagnostics::init(args.debug_file.as_deref(), &args.log_level)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building async runtime")?;

    let config = runtime.block_on(Config::resolve(args))?;
    let _span = info_span!(
        "forwarder",
        log_group = %config.log_group,
        log_stream = %config.log_stream
    )
    .entered();
    info!(
        region = %config.region,
        endpoint = ?config.endpoint,
        cache_sequence_tokens = config.cache_sequence_tokens,
        "forwarding syslog to CloudWatch Logs"
    );

    let client = runtime.block_on(cloudwatch::connect(&config))?;
    let uploader = Uploader::new(
        CloudWatchStore::new(client, runtime),
        config.log_group.clone(),
        SequenceTokenManager::new(config.cache_sequence_tokens),
    );
    let mut adapter = ProtocolAdapter::new(uploader).confirm_startup(config.confirm_startup);

    adapter
        .run(io::stdin().lock(), io::stdout().lock(), io::stderr())
        .context("relaying syslog messages")?;
    Ok(())
}
