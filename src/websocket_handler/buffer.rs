//! Bounded FIFO holding envelopes that could not be sent yet.
//!
//! Overflow evicts the oldest entry. Producers are never throttled by network
//! state; completeness of the stream is traded for liveness of the logger.

use std::collections::VecDeque;

use super::envelope::BufferedEnvelope;

#[derive(Debug)]
pub struct BoundedBuffer {
    items: VecDeque<BufferedEnvelope>,
    capacity: usize,
    dropped: u64,
}

impl BoundedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Append an envelope, returning the entry evicted to make room.
    ///
    /// A zero-capacity buffer evicts the incoming envelope itself.
    pub fn enqueue(&mut self, envelope: BufferedEnvelope) -> Option<BufferedEnvelope> {
        if self.capacity == 0 {
            self.dropped += 1;
            return Some(envelope);
        }
        let evicted = if self.items.len() >= self.capacity {
            self.dropped += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(envelope);
        evicted
    }

    pub fn dequeue(&mut self) -> Option<BufferedEnvelope> {
        self.items.pop_front()
    }

    /// Oldest envelope, left in place.
    pub fn front(&self) -> Option<&BufferedEnvelope> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total envelopes evicted by overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Change the capacity, evicting the oldest entries that no longer fit.
    /// Returns the number evicted.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity;
        let excess = self.items.len().saturating_sub(capacity);
        self.items.drain(..excess);
        self.dropped += excess as u64;
        excess
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferedEnvelope> {
        self.items.iter()
    }
}
