use crate::buffering::{BufferingStage, RING_BUFFER};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{FilterStage, Stage, StageRunner, REJECT_NEGATIVE, REJECT_NON_MULTIPLE_OF_3};
use crate::Value;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::thread::{Builder, JoinHandle};
use std::time::Duration;
use tracing::info_span;

/// Create a rendezvous channel: every send blocks until it is received
pub fn channel() -> (Sender<Value>, Receiver<Value>) {
    bounded(0)
}

/// Builder for constructing pipelines
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Create a new pipeline builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ring-buffer capacity of the buffering stage
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = buffer_size;
        self
    }

    /// Set the flush timer period of the buffering stage
    pub fn flush_interval(mut self, flush_interval: Duration) -> Self {
        self.config.flush_interval = flush_interval;
        self
    }

    /// Replace all settings at once
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        Pipeline::new(self.config)
    }
}

/// The fixed three-stage chain: reject negatives, reject non-multiples of
/// three, then batch through the ring buffer.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    stage_names: Vec<&'static str>,
    metrics: Vec<StageMetrics>,
    started: bool,
}

impl Pipeline {
    /// Create a pipeline from a configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let stage_names = vec![REJECT_NEGATIVE, REJECT_NON_MULTIPLE_OF_3, RING_BUFFER];
        let metrics = stage_names.iter().map(|_| StageMetrics::new()).collect();
        Ok(Self {
            config,
            stage_names,
            metrics,
            started: false,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the stages in execution order
    pub fn stage_names(&self) -> &[&'static str] {
        &self.stage_names
    }

    /// Get metrics for a specific stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Spawn one thread per stage, reading from `source`.
    ///
    /// The pipeline runs until `source` closes; closure then propagates
    /// stage by stage until the output channel of the last stage closes.
    pub fn start(&mut self, source: Receiver<Value>) -> Result<RunningPipeline> {
        if self.started {
            return Err(PipelineError::AlreadyStarted);
        }
        self.started = true;

        let buffering = BufferingStage::new(&self.config)?.with_metrics(self.metrics[2].clone());

        let (negative_tx, negative_rx) = channel();
        let (multiple_tx, multiple_rx) = channel();
        let (output_tx, output_rx) = channel();

        let mut handles = Vec::with_capacity(self.stage_names.len());
        handles.push(spawn_filter(
            source,
            negative_tx,
            FilterStage::reject_negative(),
            self.metrics[0].clone(),
        )?);
        handles.push(spawn_filter(
            negative_rx,
            multiple_tx,
            FilterStage::reject_non_multiple_of_3(),
            self.metrics[1].clone(),
        )?);
        handles.push(spawn_stage(RING_BUFFER, move || {
            buffering.run(multiple_rx, output_tx)
        })?);

        Ok(RunningPipeline {
            output: output_rx,
            handles,
            stage_names: self.stage_names.clone(),
            metrics: self.metrics.clone(),
        })
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        format_summary(&self.stage_names, &self.metrics)
    }
}

fn spawn_filter<S: Stage>(
    input: Receiver<Value>,
    output: Sender<Value>,
    stage: S,
    metrics: StageMetrics,
) -> Result<(String, JoinHandle<Result<()>>)> {
    let name = stage.name().to_string();
    let runner = StageRunner::new(input, output).with_metrics(metrics);
    spawn_stage(&name, move || runner.run(Box::new(stage)))
}

fn spawn_stage<F>(name: &str, body: F) -> Result<(String, JoinHandle<Result<()>>)>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let span_name = name.to_string();
    let handle = Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _span = info_span!("stage", name = %span_name).entered();
            body()
        })
        .map_err(|e| PipelineError::Thread(format!("failed to spawn {name}: {e}")))?;
    Ok((name.to_string(), handle))
}

fn format_summary(names: &[&'static str], metrics: &[StageMetrics]) -> String {
    let mut summary = String::from("Pipeline Metrics Summary:\n");
    for (i, (name, metrics)) in names.iter().zip(metrics).enumerate() {
        summary.push_str(&format!(
            "  Stage {} ({}): {}\n",
            i,
            name,
            metrics.snapshot().format()
        ));
    }
    summary
}

/// A running pipeline whose output can be consumed and whose stages can be
/// joined
pub struct RunningPipeline {
    output: Receiver<Value>,
    handles: Vec<(String, JoinHandle<Result<()>>)>,
    stage_names: Vec<&'static str>,
    metrics: Vec<StageMetrics>,
}

impl RunningPipeline {
    /// Output channel of the buffering stage
    pub fn output(&self) -> Receiver<Value> {
        self.output.clone()
    }

    /// Get metrics for a stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Get metrics summary
    pub fn metrics_summary(&self) -> String {
        format_summary(&self.stage_names, &self.metrics)
    }

    /// Receive every output value until the pipeline closes, then join the
    /// stage threads
    pub fn collect(self) -> Result<Vec<Value>> {
        let values = self.output.iter().collect();
        self.wait()?;
        Ok(values)
    }

    /// Wait for every stage thread to finish.
    ///
    /// The output must be consumed elsewhere, or the buffering stage blocks
    /// on its next send. The first stage error is returned.
    pub fn wait(self) -> Result<()> {
        let RunningPipeline {
            output, handles, ..
        } = self;
        drop(output);

        let mut first_error = None;
        for (name, handle) in handles {
            let result = handle
                .join()
                .map_err(|_| PipelineError::Thread(format!("stage {name} panicked")))
                .and_then(|result| result);
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
