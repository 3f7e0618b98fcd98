//! Ring Buffer Implementation

use crate::RingBufferError;

/// Fixed-capacity ring buffer that overwrites its oldest entry when full
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Pre-allocated storage, never grows past `capacity`
    storage: Vec<T>,
    /// Capacity of the buffer
    capacity: usize,
    /// Next write slot (oldest entry once the buffer is full)
    head: usize,
    /// Total entries written (for statistics)
    total_written: usize,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer with given capacity
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        Ok(Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            total_written: 0,
        })
    }

    /// Push an entry into the buffer, returning the evicted entry if it was full
    pub fn push(&mut self, item: T) -> Option<T> {
        self.total_written += 1;

        if self.storage.len() < self.capacity {
            self.storage.push(item);
            self.head = self.storage.len() % self.capacity;
            return None;
        }

        let evicted = std::mem::replace(&mut self.storage[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Get the number of entries currently in the buffer
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.storage.len() == self.capacity
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let start = if self.is_full() { self.head } else { 0 };
        let len = self.storage.len();
        (0..len).map(move |i| &self.storage[(start + i) % len])
    }

    /// Get total entries written (for statistics)
    pub fn total_written(&self) -> usize {
        self.total_written
    }

    /// Clear the buffer, keeping its allocation
    pub fn clear(&mut self) {
        self.storage.clear();
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_and_read() {
        let mut buffer = RingBuffer::new(10).unwrap();

        for i in 0..5 {
            buffer.push(i * 100);
        }

        assert_eq!(buffer.len(), 5);
        assert!(!buffer.is_full());

        let items: Vec<_> = buffer.iter().copied().collect();
        assert_eq!(items, vec![0, 100, 200, 300, 400]); // Oldest first
    }

    #[test]
    fn test_overwrite_oldest() {
        let mut buffer = RingBuffer::new(5).unwrap();

        // Fill beyond capacity
        let mut evicted = Vec::new();
        for i in 0..8 {
            if let Some(old) = buffer.push(i) {
                evicted.push(old);
            }
        }

        assert_eq!(buffer.len(), 5);
        assert!(buffer.is_full());
        assert_eq!(evicted, vec![0, 1, 2]);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5, 6, 7]);
        assert_eq!(buffer.total_written(), 8);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            RingBuffer::<u8>::new(0).unwrap_err(),
            RingBufferError::ZeroCapacity
        );
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buffer = RingBuffer::new(3).unwrap();
        buffer.push(1);
        buffer.push(2);
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 3);

        buffer.push(9);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![9]);
    }

    proptest! {
        #[test]
        fn prop_keeps_most_recent(capacity in 1usize..8, values in proptest::collection::vec(any::<i32>(), 0..40)) {
            let mut buffer = RingBuffer::new(capacity).unwrap();
            for &v in &values {
                buffer.push(v);
            }
            let expected: Vec<i32> = values
                .iter()
                .copied()
                .skip(values.len().saturating_sub(capacity))
                .collect();
            prop_assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), expected);
        }
    }
}
