use std::collections::{HashSet, VecDeque};

use super::types::StreamId;

pub const RECENT_IDS_CAPACITY: usize = 1000;
pub const RECENT_IDS_EVICT_BATCH: usize = 100;

/// Bounded memory of message ids already seen, per stream.
///
/// Once the capacity is exceeded the oldest batch is forgotten in one go.
#[derive(Debug)]
pub struct RecentIds {
    order: VecDeque<(StreamId, String)>,
    seen: HashSet<(StreamId, String)>,
    capacity: usize,
    evict_batch: usize,
}

impl Default for RecentIds {
    fn default() -> Self {
        Self::with_limits(RECENT_IDS_CAPACITY, RECENT_IDS_EVICT_BATCH)
    }
}

impl RecentIds {
    pub fn with_limits(capacity: usize, evict_batch: usize) -> Self {
        Self {
            order: VecDeque::new(),
            seen: HashSet::new(),
            capacity: capacity.max(1),
            evict_batch: evict_batch.clamp(1, capacity.max(1)),
        }
    }

    /// Records the id. Returns `false` when it was already known.
    pub fn insert(&mut self, stream_id: &StreamId, message_id: &str) -> bool {
        let key = (stream_id.clone(), message_id.to_string());
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);

        if self.order.len() > self.capacity {
            for _ in 0..self.evict_batch {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.seen.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        true
    }

    pub fn contains(&self, stream_id: &StreamId, message_id: &str) -> bool {
        self.seen
            .contains(&(stream_id.clone(), message_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}
