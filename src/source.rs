//! Console input: newline-delimited integers feeding the pipeline.

use crate::error::{PipelineError, Result};
use crate::pipeline::channel;
use crate::Value;
use crossbeam::channel::{Receiver, Sender};
use std::io::{BufRead, Write};
use std::thread::{Builder, JoinHandle};
use tracing::{debug, info, warn};

/// Stage name of the console source
pub const CONSOLE_SOURCE: &str = "console_source";

/// Token that ends input when no other sentinel is configured
pub const DEFAULT_SENTINEL: &str = "exit";

/// A parsed input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Value(Value),
    Sentinel,
}

/// Parse one trimmed line. The sentinel is matched case-insensitively.
pub fn parse_record(line: &str, sentinel: &str) -> Result<Record> {
    let text = line.trim();
    if text.eq_ignore_ascii_case(sentinel) {
        return Ok(Record::Sentinel);
    }
    text.parse::<Value>()
        .map(Record::Value)
        .map_err(|e| PipelineError::InvalidRecord {
            record: text.to_string(),
            reason: e.to_string(),
        })
}

/// Counts reported by a finished source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub accepted: u64,
    pub invalid: u64,
}

/// Reads integers line by line and sends them into the pipeline.
///
/// Malformed lines are reported on the console writer and skipped; they
/// never enter the pipeline.
pub struct ConsoleSource<R, W> {
    reader: R,
    console: W,
    sentinel: String,
}

impl<R: BufRead, W: Write> ConsoleSource<R, W> {
    pub fn new(reader: R, console: W) -> Self {
        Self {
            reader,
            console,
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }

    /// Use a different token to end input
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Read until the sentinel or end of input. Dropping `output` on return
    /// closes the pipeline input.
    pub fn run(mut self, output: Sender<Value>) -> Result<SourceReport> {
        let mut report = SourceReport::default();
        writeln!(
            self.console,
            "Enter integers (type '{}' to quit):",
            self.sentinel
        )?;

        let mut line = Vec::new();
        loop {
            write!(self.console, "> ")?;
            self.console.flush()?;

            line.clear();
            if self.reader.read_until(b'\n', &mut line)? == 0 {
                debug!("end of input");
                break;
            }

            // Bytes that are not UTF-8 are a malformed record, not a read failure.
            let record = std::str::from_utf8(&line)
                .map_err(|e| PipelineError::InvalidRecord {
                    record: String::from_utf8_lossy(&line).trim().to_string(),
                    reason: e.to_string(),
                })
                .and_then(|text| parse_record(text, &self.sentinel));

            match record {
                Ok(Record::Sentinel) => {
                    writeln!(self.console, "Input finished...")?;
                    break;
                }
                Ok(Record::Value(value)) => {
                    output.send(value).map_err(|_| PipelineError::UpstreamClosed {
                        stage: CONSOLE_SOURCE.to_string(),
                    })?;
                    report.accepted += 1;
                    writeln!(self.console, "Sent to pipeline: {value}")?;
                }
                Err(e) => {
                    warn!(error = %e, "discarding malformed record");
                    report.invalid += 1;
                    writeln!(self.console, "Error! Please enter an integer")?;
                }
            }
        }

        info!(
            accepted = report.accepted,
            invalid = report.invalid,
            "console source closed"
        );
        Ok(report)
    }
}

impl<R, W> ConsoleSource<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    /// Run the source on its own thread and return the channel it feeds
    pub fn spawn(self) -> Result<(Receiver<Value>, JoinHandle<Result<SourceReport>>)> {
        let (tx, rx) = channel();
        let handle = Builder::new()
            .name(CONSOLE_SOURCE.to_string())
            .spawn(move || self.run(tx))
            .map_err(|e| PipelineError::Thread(format!("failed to spawn {CONSOLE_SOURCE}: {e}")))?;
        Ok((rx, handle))
    }
}
