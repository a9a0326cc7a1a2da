//! Ringbuffer module for bounded in-memory history.
//!
//! A fixed-capacity circular buffer: once full, every push overwrites the
//! oldest entry, so memory use is fixed at construction time.

/// A circular buffer with fixed capacity.
#[derive(Debug, Clone)]
pub struct Ringbuffer<T> {
    entries: Vec<Option<T>>,
    capacity: usize,
    write_index: usize,
    count: usize,
}

impl<T: Clone> Ringbuffer<T> {
    /// Creates a new ringbuffer with the specified capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = Vec::with_capacity(capacity);
        entries.resize(capacity, None);

        Self {
            entries,
            capacity,
            write_index: 0,
            count: 0,
        }
    }

    /// Pushes a new entry into the ringbuffer.
    ///
    /// If the buffer is full, the oldest entry will be overwritten.
    pub fn push(&mut self, entry: T) {
        self.entries[self.write_index] = Some(entry);
        self.write_index = (self.write_index + 1) % self.capacity;

        if self.count < self.capacity {
            self.count += 1;
        }
    }

    /// Returns all entries in chronological order (oldest to newest).
    pub fn get_history(&self) -> Vec<T> {
        self.last_n(self.count)
    }

    /// Returns up to `n` most recent entries, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<T> {
        let n = n.min(self.count);
        let mut result = Vec::with_capacity(n);
        // Index of the oldest of the requested entries.
        let start = (self.write_index + self.capacity - n) % self.capacity;
        for i in 0..n {
            if let Some(entry) = &self.entries[(start + i) % self.capacity] {
                result.push(entry.clone());
            }
        }
        result
    }

    /// Returns the most recently pushed entry.
    pub fn latest(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.write_index + self.capacity - 1) % self.capacity;
        self.entries[idx].as_ref()
    }

    /// Returns the current number of entries in the buffer.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns the maximum capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
