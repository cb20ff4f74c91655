//! The rsyslog `omprog` side of the forwarder.
//!
//! Every input line is parsed, turned into a [`LogEvent`](crate::model::LogEvent) and
//! appended to the store before the next line is read. The feeder treats a line as delivered
//! only when it reads `OK` back; anything else, including silence, makes it redeliver the
//! line later. Diagnostics therefore never go to the acknowledgment writer.

use std::io::{self, BufRead, Write};

use tracing::{debug, info};

use crate::input::{build_event, parse_record};
use crate::store::LogStore;
use crate::uploader::{Delivery, Uploader};

/// The only thing ever written to the acknowledgment channel.
pub const ACK: &str = "OK";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub lines: u64,
    pub acknowledged: u64,
    pub rejected: u64,
    pub failed: u64,
}

pub struct ProtocolAdapter<S> {
    uploader: Uploader<S>,
    confirm_startup: bool,
}

impl<S: LogStore> ProtocolAdapter<S> {
    pub fn new(uploader: Uploader<S>) -> Self {
        Self {
            uploader,
            confirm_startup: false,
        }
    }

    /// Send one `OK` before reading input, for feeders that wait for the program to start.
    pub fn confirm_startup(mut self, confirm: bool) -> Self {
        self.confirm_startup = confirm;
        self
    }

    #[cfg(test)]
    pub fn uploader(&self) -> &Uploader<S> {
        &self.uploader
    }

    pub fn handle_line(&mut self, line: &str) -> Delivery {
        let line = line.trim_end();
        debug!("received line: {line}");
        let record = parse_record(line);
        let event = build_event(&record);
        self.uploader.deliver(&event)
    }

    /// Processes `input` until it closes. I/O errors on the channels themselves end the run.
    pub fn run<R, W, E>(&mut self, mut input: R, mut ack: W, mut errors: E) -> io::Result<Summary>
    where
        R: BufRead,
        W: Write,
        E: Write,
    {
        if self.confirm_startup {
            writeln!(ack, "{ACK}")?;
            ack.flush()?;
        }

        let mut summary = Summary::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            summary.lines += 1;

            let line = String::from_utf8_lossy(&buf);
            match self.handle_line(&line) {
                Delivery::Accepted => {
                    writeln!(ack, "{ACK}")?;
                    ack.flush()?;
                    summary.acknowledged += 1;
                }
                Delivery::Rejected(info) => {
                    debug!(?info, "line not acknowledged");
                    summary.rejected += 1;
                }
                Delivery::Failed(err) => {
                    writeln!(errors, "ERROR: {err}")?;
                    errors.flush()?;
                    summary.failed += 1;
                }
            }
        }

        info!(
            lines = summary.lines,
            acknowledged = summary.acknowledged,
            rejected = summary.rejected,
            failed = summary.failed,
            "input closed"
        );
        Ok(summary)
    }
}
