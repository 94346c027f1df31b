use thiserror::Error;

/// Result type for batch pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline has already been started
    #[error("Pipeline has already been started")]
    AlreadyStarted,

    /// Invalid buffer size or flush interval
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stage could not forward a value because its consumer went away
    #[error("Stage {stage}: downstream closed before all values were forwarded")]
    DownstreamClosed { stage: String },

    /// The source could not hand off a value because the pipeline went away
    #[error("Stage {stage}: pipeline input closed")]
    UpstreamClosed { stage: String },

    /// A text record that does not parse as an integer
    #[error("Invalid record {record:?}: {reason}")]
    InvalidRecord { record: String, reason: String },

    /// Thread spawn or join error
    #[error("Thread error: {0}")]
    Thread(String),

    /// Console read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn downstream_closed(stage: &str) -> Self {
        Self::DownstreamClosed {
            stage: stage.to_string(),
        }
    }
}
