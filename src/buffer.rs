use crate::error::{PipelineError, Result};

/// A fixed-capacity circular buffer that overwrites its oldest value when full.
///
/// The buffer has no internal synchronisation: it is owned by exactly one
/// stage thread, which is the only caller of `push`, `values` and `clear`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T: Clone> {
    slots: Vec<Option<T>>,
    /// Index the next push writes to
    head: usize,
    count: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create an empty ring buffer with the given capacity
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::Config(
                "ring buffer capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            slots: vec![None; capacity],
            head: 0,
            count: 0,
        })
    }

    /// Store a value, overwriting the oldest one once the buffer is full
    pub fn push(&mut self, value: T) {
        let capacity = self.capacity();
        self.slots[self.head] = Some(value);
        self.head = (self.head + 1) % capacity;
        if self.count < capacity {
            self.count += 1;
        }
    }

    /// Snapshot of the held values, oldest first
    pub fn values(&self) -> Vec<T> {
        let capacity = self.capacity();
        let oldest = (self.head + capacity - self.count) % capacity;
        (0..self.count)
            .filter_map(|offset| self.slots[(oldest + offset) % capacity].clone())
            .collect()
    }

    /// Discard every held value
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.count = 0;
    }

    /// Number of values currently held
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if the buffer holds `capacity` values
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
