use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What caused the buffering stage to emit its held values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The ring buffer reached its capacity
    Capacity,
    /// The periodic flush timer fired
    Timer,
    /// The input closed and the remaining values were drained
    Drain,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlushTrigger::Capacity => "capacity",
            FlushTrigger::Timer => "timer",
            FlushTrigger::Drain => "drain",
        };
        f.write_str(name)
    }
}

/// One recorded flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushRecord {
    pub trigger: FlushTrigger,
    pub size: usize,
}

/// Sliding window of the most recent flushes
#[derive(Debug, Clone)]
pub struct FlushHistory {
    records: Arc<Mutex<VecDeque<FlushRecord>>>,
    window_size: usize,
}

impl FlushHistory {
    /// Create a history that keeps at most `window_size` records
    pub fn new(window_size: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size,
        }
    }

    /// Record a flush, evicting the oldest record when the window is full
    pub fn record(&self, trigger: FlushTrigger, size: usize) {
        let mut records = self.records.lock();
        if records.len() >= self.window_size {
            records.pop_front();
        }
        records.push_back(FlushRecord { trigger, size });
    }

    /// Recorded flushes, oldest first
    pub fn records(&self) -> Vec<FlushRecord> {
        self.records.lock().iter().copied().collect()
    }

    /// Get the count of recorded flushes still in the window
    pub fn count(&self) -> usize {
        self.records.lock().len()
    }
}

/// Per-stage metrics collector
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Values taken from the input channel
    received: Arc<AtomicU64>,
    /// Values handed to the output channel
    forwarded: Arc<AtomicU64>,
    /// Values dropped by a predicate
    rejected: Arc<AtomicU64>,
    /// Number of non-empty flushes
    flushes: Arc<AtomicU64>,
    flush_history: FlushHistory,
    /// Creation time for throughput calculation
    start_time: Instant,
}

impl StageMetrics {
    /// Create a new metrics collector for a stage
    pub fn new() -> Self {
        Self {
            received: Arc::new(AtomicU64::new(0)),
            forwarded: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            flushes: Arc::new(AtomicU64::new(0)),
            flush_history: FlushHistory::new(1000),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a flush of `size` values
    pub fn record_flush(&self, trigger: FlushTrigger, size: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flush_history.record(trigger, size);
    }

    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn total_forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn total_flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Recent flushes, oldest first
    pub fn flushes(&self) -> Vec<FlushRecord> {
        self.flush_history.records()
    }

    /// Forwarded values per second since the collector was created
    pub fn throughput_vps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_forwarded() as f64 / elapsed
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_received: self.total_received(),
            total_forwarded: self.total_forwarded(),
            total_rejected: self.total_rejected(),
            total_flushes: self.total_flushes(),
            throughput_vps: self.throughput_vps(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_received: u64,
    pub total_forwarded: u64,
    pub total_rejected: u64,
    pub total_flushes: u64,
    pub throughput_vps: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {}, Forwarded: {}, Rejected: {}, Flushes: {}, \
             Throughput: {:.2} values/s, Elapsed: {:.2}s",
            self.total_received,
            self.total_forwarded,
            self.total_rejected,
            self.total_flushes,
            self.throughput_vps,
            self.elapsed.as_secs_f64()
        )
    }
}
