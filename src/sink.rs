//! Console output for values leaving the pipeline.

use crate::error::Result;
use crate::Value;
use crossbeam::channel::Receiver;
use std::io::Write;
use tracing::info;

/// Writes one line per received value and a completion line on closure
pub struct ConsoleSink<W: Write> {
    console: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(console: W) -> Self {
        Self { console }
    }

    /// Consume `output` until it closes, returning the number of values seen
    pub fn consume(&mut self, output: &Receiver<Value>) -> Result<u64> {
        let mut received = 0;
        for value in output.iter() {
            writeln!(self.console, ">>> Received data: {value}")?;
            received += 1;
        }
        writeln!(self.console, "Pipeline finished!")?;
        self.console.flush()?;
        info!(received, "pipeline output closed");
        Ok(received)
    }

    pub fn into_inner(self) -> W {
        self.console
    }
}
