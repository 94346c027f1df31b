//! An integer stream pipeline with filter stages and a timed batching stage.
//!
//! Values flow one way through rendezvous channels, one thread per stage:
//!
//! ```text
//! source -> reject_negative -> reject_non_multiple_of_3 -> ring_buffer -> consumer
//! ```
//!
//! The buffering stage holds values in a fixed-capacity ring buffer and
//! flushes them downstream, oldest first, when the buffer fills up or when
//! its flush timer fires. Closing the source drains whatever is still
//! buffered before the output closes, so no accepted value is lost.
//!
//! # Features
//!
//! - Synchronous hand-off between stages, giving back-pressure end to end
//! - Capacity- and timer-triggered flushes from a single control loop
//! - Per-stage metrics: received, forwarded, rejected, flush history
//! - Console source and sink for interactive use
//!
//! # Example
//!
//! ```ignore
//! use batch_pipeline::{channel, PipelineBuilder};
//! use std::time::Duration;
//!
//! let mut pipeline = PipelineBuilder::new()
//!     .buffer_size(5)
//!     .flush_interval(Duration::from_secs(30))
//!     .build()?;
//!
//! let (input, source) = channel();
//! let running = pipeline.start(source)?;
//!
//! std::thread::spawn(move || {
//!     for value in [5, -2, 9, 0, 12, 6] {
//!         input.send(value).ok();
//!     }
//! });
//!
//! assert_eq!(running.collect()?, vec![9, 12, 6]);
//! ```

pub mod buffer;
pub mod buffering;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod stage;

/// The unit of data carried by every channel
pub type Value = i64;

// Re-exports for convenience
pub use buffer::RingBuffer;
pub use buffering::{BufferState, BufferingStage};
pub use config::{PipelineConfig, DEFAULT_BUFFER_SIZE, DEFAULT_FLUSH_INTERVAL};
pub use error::{PipelineError, Result};
pub use metrics::{FlushRecord, FlushTrigger, MetricsSnapshot, StageMetrics};
pub use pipeline::{channel, Pipeline, PipelineBuilder, RunningPipeline};
pub use sink::ConsoleSink;
pub use source::{parse_record, ConsoleSource, Record, SourceReport, DEFAULT_SENTINEL};
pub use stage::{FilterStage, Stage, StageRunner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
