//! Fixed-capacity history buffer.
//!
//! Append-only log of recent items that overwrites the oldest entry once
//! full. Used by the wrapper to keep the tail of the server console and
//! the recent chat messages without unbounded growth.

/// Ring buffer holding at most `capacity` items, oldest overwritten first.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    slots: Vec<Option<T>>,
    /// Index the next append writes to.
    head: usize,
    len: usize,
}

impl<T: Clone> BoundedHistory<T> {
    /// Create a buffer that retains the last `capacity` appended items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedHistory capacity must be non-zero");
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of items retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of items currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append an item, overwriting the oldest one once the buffer is full.
    pub fn append(&mut self, item: T) {
        self.slots[self.head] = Some(item);
        self.head = (self.head + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    /// All retained items, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        let capacity = self.slots.len();
        let start = (self.head + capacity - self.len) % capacity;
        (0..self.len)
            .filter_map(|i| self.slots[(start + i) % capacity].clone())
            .collect()
    }

    /// The last `min(k, len)` items, oldest first.
    #[must_use]
    pub fn suffix(&self, k: usize) -> Vec<T> {
        let mut items = self.snapshot();
        let skip = items.len().saturating_sub(k);
        items.split_off(skip)
    }
}
