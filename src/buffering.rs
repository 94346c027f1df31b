//! The timed batching stage.
//!
//! A single control loop waits on two event sources, the input channel and a
//! periodic ticker, and services exactly one event per iteration. The ring
//! buffer is only ever touched from inside that loop.
//!
//! When a value and a tick are both ready, `select!` picks one of them at
//! random. Either order is safe: a capacity flush always completes inside
//! the iteration that filled the buffer, so a tick serviced afterwards sees
//! an empty buffer and does nothing.

use crate::buffer::RingBuffer;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::{FlushTrigger, StageMetrics};
use crate::Value;
use crossbeam::channel::{select, tick, Receiver, Sender};
use std::time::Duration;
use tracing::{debug, info};

/// Stage name of the buffering stage
pub const RING_BUFFER: &str = "ring_buffer";

/// Lifecycle of the buffering stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Waiting for the next value or tick
    Running,
    /// Emitting held values; no pushes happen in this state
    Flushing,
    /// Input closed, emitting what is left
    Draining,
    /// Output closed, terminal
    Closed,
}

/// Batches values in a ring buffer and flushes them downstream when the
/// buffer fills up, when the flush timer fires, or when the input closes.
#[derive(Debug)]
pub struct BufferingStage {
    buffer: RingBuffer<Value>,
    flush_interval: Duration,
    state: BufferState,
    metrics: StageMetrics,
}

impl BufferingStage {
    /// Create a buffering stage from a validated configuration
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            buffer: RingBuffer::new(config.buffer_size)?,
            flush_interval: config.flush_interval,
            state: BufferState::Running,
            metrics: StageMetrics::new(),
        })
    }

    /// Report into an existing metrics collector
    pub fn with_metrics(mut self, metrics: StageMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Run the control loop until the input closes.
    ///
    /// The output sender is dropped when this returns, which closes the
    /// channel for the consumer. The ticker is dropped with it.
    pub fn run(mut self, input: Receiver<Value>, output: Sender<Value>) -> Result<()> {
        let ticker = tick(self.flush_interval);
        info!(
            capacity = self.buffer.capacity(),
            interval = ?self.flush_interval,
            "buffering stage started"
        );

        loop {
            select! {
                recv(input) -> msg => match msg {
                    Ok(value) => self.on_value(value, &output)?,
                    Err(_) => break,
                },
                recv(ticker) -> _ => self.on_tick(&output)?,
            }
        }

        self.drain(&output)?;
        info!(
            flushes = self.metrics.total_flushes(),
            forwarded = self.metrics.total_forwarded(),
            "input closed, buffering stage finished"
        );
        Ok(())
    }

    fn on_value(&mut self, value: Value, output: &Sender<Value>) -> Result<()> {
        self.metrics.record_received();
        self.buffer.push(value);
        debug!(value, held = self.buffer.len(), "buffered");

        if self.buffer.is_full() {
            self.flush(FlushTrigger::Capacity, output)?;
        }
        Ok(())
    }

    fn on_tick(&mut self, output: &Sender<Value>) -> Result<()> {
        if self.buffer.is_empty() {
            debug!("flush timer fired on an empty buffer");
            return Ok(());
        }
        self.flush(FlushTrigger::Timer, output)
    }

    fn drain(&mut self, output: &Sender<Value>) -> Result<()> {
        self.state = BufferState::Draining;
        if !self.buffer.is_empty() {
            self.flush(FlushTrigger::Drain, output)?;
        }
        self.state = BufferState::Closed;
        Ok(())
    }

    /// Emit every held value oldest-first, then clear the buffer
    fn flush(&mut self, trigger: FlushTrigger, output: &Sender<Value>) -> Result<()> {
        let values = self.buffer.values();
        let resume = self.state;
        self.state = BufferState::Flushing;
        info!(%trigger, size = values.len(), "flushing buffer");

        for &value in &values {
            output
                .send(value)
                .map_err(|_| PipelineError::downstream_closed(RING_BUFFER))?;
            self.metrics.record_forwarded();
        }

        self.buffer.clear();
        self.metrics.record_flush(trigger, values.len());
        self.state = resume;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{bounded, RecvTimeoutError};
    use std::thread::{self, JoinHandle};
    use std::time::Instant;

    const LONG: Duration = Duration::from_secs(60);

    fn spawn_stage(
        config: PipelineConfig,
    ) -> (Sender<Value>, Receiver<Value>, StageMetrics, JoinHandle<Result<()>>) {
        let (in_tx, in_rx) = bounded(0);
        let (out_tx, out_rx) = bounded(0);
        let stage = BufferingStage::new(&config).unwrap();
        let metrics = stage.metrics().clone();
        let handle = thread::spawn(move || stage.run(in_rx, out_tx));
        (in_tx, out_rx, metrics, handle)
    }

    fn recv_n(output: &Receiver<Value>, n: usize) -> Vec<Value> {
        (0..n)
            .map(|_| output.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PipelineConfig::new(0, LONG);
        assert!(matches!(
            BufferingStage::new(&config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_flush_on_full() {
        let (input, output, metrics, handle) = spawn_stage(PipelineConfig::new(3, LONG));

        for value in [3, 6, 9] {
            input.send(value).unwrap();
        }
        assert_eq!(recv_n(&output, 3), vec![3, 6, 9]);

        drop(input);
        assert!(output.recv().is_err());
        handle.join().unwrap().unwrap();

        let flushes = metrics.flushes();
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].trigger, FlushTrigger::Capacity);
        assert_eq!(flushes[0].size, 3);
    }

    #[test]
    fn test_consecutive_capacity_flushes_preserve_order() {
        let (input, output, metrics, handle) = spawn_stage(PipelineConfig::new(2, LONG));

        let producer = thread::spawn(move || {
            for value in 1..=5 {
                input.send(value).unwrap();
            }
        });
        let received: Vec<Value> = output.iter().collect();
        producer.join().unwrap();
        handle.join().unwrap().unwrap();

        assert_eq!(received, vec![1, 2, 3, 4, 5]);
        let triggers: Vec<_> = metrics.flushes().iter().map(|f| f.trigger).collect();
        assert_eq!(
            triggers,
            vec![FlushTrigger::Capacity, FlushTrigger::Capacity, FlushTrigger::Drain]
        );
    }

    #[test]
    fn test_flush_on_timer() {
        let (input, output, metrics, handle) =
            spawn_stage(PipelineConfig::new(5, Duration::from_millis(200)));

        input.send(12).unwrap();
        input.send(15).unwrap();
        assert_eq!(recv_n(&output, 2), vec![12, 15]);

        // A second period with nothing buffered must not emit anything.
        thread::sleep(Duration::from_millis(450));
        assert!(matches!(
            output.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Timeout)
        ));

        drop(input);
        assert!(output.recv().is_err());
        handle.join().unwrap().unwrap();

        let flushes = metrics.flushes();
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].trigger, FlushTrigger::Timer);
        assert_eq!(flushes[0].size, 2);
    }

    #[test]
    fn test_capacity_flush_does_not_reset_timer() {
        let interval = Duration::from_millis(300);
        let started = Instant::now();
        let (input, output, metrics, handle) = spawn_stage(PipelineConfig::new(2, interval));

        thread::sleep(Duration::from_millis(200));
        input.send(3).unwrap();
        input.send(6).unwrap();
        assert_eq!(recv_n(&output, 2), vec![3, 6]);

        input.send(9).unwrap();
        assert_eq!(recv_n(&output, 1), vec![9]);
        // A timer restarted by the capacity flush would fire at ~500ms.
        assert!(started.elapsed() < Duration::from_millis(450));

        drop(input);
        assert!(output.recv().is_err());
        handle.join().unwrap().unwrap();

        let shape: Vec<_> = metrics.flushes().iter().map(|f| (f.trigger, f.size)).collect();
        assert_eq!(
            shape,
            vec![(FlushTrigger::Capacity, 2), (FlushTrigger::Timer, 1)]
        );
    }

    #[test]
    fn test_timer_on_empty_buffer_is_noop() {
        let (input, output, metrics, handle) =
            spawn_stage(PipelineConfig::new(5, Duration::from_millis(20)));

        thread::sleep(Duration::from_millis(120));
        drop(input);

        assert!(output.recv().is_err());
        handle.join().unwrap().unwrap();
        assert_eq!(metrics.total_flushes(), 0);
    }

    #[test]
    fn test_drain_on_close() {
        let (input, output, metrics, handle) = spawn_stage(PipelineConfig::new(5, LONG));

        for value in [9, 12, 6] {
            input.send(value).unwrap();
        }
        drop(input);

        let received: Vec<Value> = output.iter().collect();
        handle.join().unwrap().unwrap();

        assert_eq!(received, vec![9, 12, 6]);
        let flushes = metrics.flushes();
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].trigger, FlushTrigger::Drain);
    }

    #[test]
    fn test_close_with_empty_buffer_emits_nothing() {
        let (input, output, metrics, handle) = spawn_stage(PipelineConfig::new(5, LONG));
        drop(input);

        assert!(output.recv().is_err());
        handle.join().unwrap().unwrap();
        assert_eq!(metrics.total_flushes(), 0);
        assert_eq!(metrics.total_forwarded(), 0);
    }

    #[test]
    fn test_state_transitions() {
        let mut stage = BufferingStage::new(&PipelineConfig::new(2, LONG)).unwrap();
        let (tx, rx) = bounded(8);
        assert_eq!(stage.state(), BufferState::Running);

        stage.on_value(3, &tx).unwrap();
        stage.on_value(6, &tx).unwrap();
        assert_eq!(stage.state(), BufferState::Running);
        assert!(stage.buffer.is_empty());

        stage.on_value(9, &tx).unwrap();
        stage.drain(&tx).unwrap();
        assert_eq!(stage.state(), BufferState::Closed);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![3, 6, 9]);
    }

    #[test]
    fn test_downstream_closed_is_reported() {
        let (input, output, _metrics, handle) = spawn_stage(PipelineConfig::new(1, LONG));
        drop(output);
        input.send(3).unwrap();
        drop(input);

        assert!(matches!(
            handle.join().unwrap(),
            Err(PipelineError::DownstreamClosed { .. })
        ));
    }
}
