use std::collections::VecDeque;

/// Bounded FIFO of serialized payloads waiting for an open connection.
///
/// When full, pushing evicts the oldest entry.
#[derive(Debug)]
pub struct OfflineQueue {
    entries: VecDeque<String>,
    capacity: usize,
}

impl OfflineQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a payload. Returns the evicted payload when the queue was full.
    pub fn push(&mut self, payload: String) -> Option<String> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(payload);
        evicted
    }

    pub fn front(&self) -> Option<&String> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the pending payloads, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
