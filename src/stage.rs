use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::Value;
use crossbeam::channel::{Receiver, Sender};
use tracing::{debug, info};

/// Stage name of the negative-number filter
pub const REJECT_NEGATIVE: &str = "reject_negative";

/// Stage name of the multiple-of-three filter
pub const REJECT_NON_MULTIPLE_OF_3: &str = "reject_non_multiple_of_3";

/// Trait for a stateless processing stage in the pipeline
pub trait Stage: Send + 'static {
    /// Process one value, returning the value to forward or `None` to drop it
    fn process(&mut self, value: Value) -> Option<Value>;

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }
}

/// Runs a stage by receiving from its input channel, processing, and sending
/// to its output channel.
///
/// The runner owns the output sender: when `run` returns, the sender is
/// dropped and the downstream stage observes closure.
pub struct StageRunner {
    input: Receiver<Value>,
    output: Sender<Value>,
    metrics: StageMetrics,
}

impl StageRunner {
    /// Create a new stage runner
    pub fn new(input: Receiver<Value>, output: Sender<Value>) -> Self {
        Self {
            input,
            output,
            metrics: StageMetrics::new(),
        }
    }

    /// Report into an existing metrics collector
    pub fn with_metrics(mut self, metrics: StageMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get a reference to the metrics
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Run the stage until its input channel closes
    pub fn run(self, mut stage: Box<dyn Stage>) -> Result<()> {
        info!(stage = stage.name(), "stage started");

        for value in self.input.iter() {
            self.metrics.record_received();
            match stage.process(value) {
                Some(value) => {
                    self.output
                        .send(value)
                        .map_err(|_| PipelineError::downstream_closed(stage.name()))?;
                    self.metrics.record_forwarded();
                }
                None => self.metrics.record_rejected(),
            }
        }

        info!(
            stage = stage.name(),
            forwarded = self.metrics.total_forwarded(),
            rejected = self.metrics.total_rejected(),
            "input closed, stage finished"
        );
        Ok(())
    }
}

/// Predicate signature used by the built-in filters
pub type Predicate = fn(Value) -> bool;

/// Passes values that are zero or positive
pub fn is_non_negative(value: Value) -> bool {
    value >= 0
}

/// Passes non-zero multiples of three. Zero is rejected on purpose.
pub fn is_nonzero_multiple_of_3(value: Value) -> bool {
    value != 0 && value % 3 == 0
}

/// A filtering stage that forwards values matching a predicate unchanged
#[derive(Debug)]
pub struct FilterStage<F>
where
    F: Fn(Value) -> bool + Send + 'static,
{
    name: String,
    reason: &'static str,
    predicate: F,
}

impl<F> FilterStage<F>
where
    F: Fn(Value) -> bool + Send + 'static,
{
    /// Create a new filter stage
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            reason: "rejected by predicate",
            predicate,
        }
    }

    /// Set the reason logged for dropped values
    pub fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = reason;
        self
    }
}

impl FilterStage<Predicate> {
    /// Drops negative values
    pub fn reject_negative() -> Self {
        Self::new(REJECT_NEGATIVE, is_non_negative as Predicate).with_reason("negative")
    }

    /// Drops zero and values that are not multiples of three
    pub fn reject_non_multiple_of_3() -> Self {
        Self::new(REJECT_NON_MULTIPLE_OF_3, is_nonzero_multiple_of_3 as Predicate)
            .with_reason("zero or not a multiple of 3")
    }
}

impl<F> Stage for FilterStage<F>
where
    F: Fn(Value) -> bool + Send + 'static,
{
    fn process(&mut self, value: Value) -> Option<Value> {
        if (self.predicate)(value) {
            Some(value)
        } else {
            debug!(stage = %self.name, value, reason = self.reason, "value dropped");
            None
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
