//! Bounded, append-only history of accepted chat events.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::models::chat_event::ChatEvent;

/// Maximum number of events retained.
pub const MAX_HISTORY: usize = 500;

/// Ordered store of the most recent accepted events.
///
/// Append order equals id order. The only removal is eviction from the head
/// once the buffer grows past capacity; nothing is ever reordered.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    events: VecDeque<Arc<ChatEvent>>,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Append to the tail, evicting from the head while over capacity.
    pub fn append(&mut self, event: Arc<ChatEvent>) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// The most recent `limit` events with `id > since_id`, oldest first.
    ///
    /// `since_id = None` applies no cursor filter. Callers clamp `limit`.
    pub fn snapshot(&self, since_id: Option<u64>, limit: usize) -> Vec<Arc<ChatEvent>> {
        if self.is_empty() || limit == 0 {
            return Vec::new();
        }
        // Ids ascend, so the matching events form a suffix of the buffer.
        let start = match since_id {
            Some(since) => self.events.partition_point(|e| e.id() <= since),
            None => 0,
        };
        let skip = (self.events.len() - start).saturating_sub(limit);
        self.events
            .iter()
            .skip(start + skip)
            .cloned()
            .collect()
    }

    /// Id of the newest event, or 0 if empty.
    pub fn last_id(&self) -> u64 {
        self.events.back().map_or(0, |e| e.id())
    }

    /// Id of the oldest retained event, if any.
    pub fn oldest_id(&self) -> Option<u64> {
        self.events.front().map(|e| e.id())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
