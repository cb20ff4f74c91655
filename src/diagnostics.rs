use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

/// Installs the global diagnostics subscriber.
///
/// With a debug file everything down to `debug` is appended there. Otherwise only
/// `log_level` and above reach stderr. Neither path touches stdout.
pub fn init(debug_file: Option<&Path>, log_level: &str) -> Result<()> {
    let installed = match debug_file {
        Some(path) => {
            let file = open_debug_file(path)?;
            tracing::subscriber::set_global_default(file_subscriber(file, filter("debug")))
        }
        None => tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(filter(log_level))
                .with_writer(io::stderr)
                .with_target(false)
                .finish(),
        ),
    };
    installed.map_err(|err| anyhow!("installing diagnostics subscriber: {err}"))
}

pub fn open_debug_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening debug file {}", path.display()))
}

fn file_subscriber(file: File, filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .finish()
}

/// `RUST_LOG` wins over the configured level.
fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
