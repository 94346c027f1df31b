use crate::error::{PipelineError, Result};
use std::time::Duration;

/// Ring-buffer capacity used when nothing else is configured
pub const DEFAULT_BUFFER_SIZE: usize = 5;

/// Flush interval used when nothing else is configured
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Tunables for the buffering stage, fixed for the lifetime of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of values held before a capacity flush
    pub buffer_size: usize,
    /// Period of the flush timer
    pub flush_interval: Duration,
}

impl PipelineConfig {
    /// Create a config with explicit values
    pub fn new(buffer_size: usize, flush_interval: Duration) -> Self {
        Self {
            buffer_size,
            flush_interval,
        }
    }

    /// Set the ring-buffer capacity
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the flush timer period
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Reject a zero capacity or a zero interval
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(PipelineError::Config(
                "buffer size must be at least 1".into(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(PipelineError::Config(
                "flush interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL)
    }
}
