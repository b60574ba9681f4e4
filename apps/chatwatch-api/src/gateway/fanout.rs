//! Fan-out hub: accepted-event history plus the registry of live subscribers.
//!
//! Every subscriber owns a bounded queue. Broadcasting never waits on a
//! subscriber; one whose queue is full or closed is dropped from the registry
//! and its stream ends once it drains what was already queued.

use std::sync::Arc;

use chatwatch_common::id::{prefix, prefixed_ulid};
use chatwatch_common::SequenceGenerator;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::history::HistoryBuffer;
use crate::models::chat_event::ChatEvent;

/// Events a subscriber may have queued before it is considered too slow.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

type SubscriberMap = DashMap<String, mpsc::Sender<Arc<ChatEvent>>>;

/// Id sequence and history, mutated together under one lock.
#[derive(Default)]
struct Journal {
    sequence: SequenceGenerator,
    history: HistoryBuffer,
}

/// Result of a pull query against the history.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub data: Vec<Arc<ChatEvent>>,
    /// Last id in `data`, or the newest id overall when `data` is empty.
    pub last_id: u64,
}

impl FeedPage {
    pub fn count(&self) -> usize {
        self.data.len()
    }
}

/// Shared hub. Store behind an `Arc` in `AppState`.
pub struct FanoutHub {
    journal: Mutex<Journal>,
    subscribers: Arc<SubscriberMap>,
    queue_capacity: usize,
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new()
    }
}

impl FanoutHub {
    pub fn new() -> Self {
        Self::with_queue_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            journal: Mutex::new(Journal::default()),
            subscribers: Arc::new(DashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Accept an event: assign the next id, build the event with it, append
    /// it to the history and broadcast it, all as one step relative to other
    /// publishers.
    pub fn publish(&self, build: impl FnOnce(u64) -> ChatEvent) -> Arc<ChatEvent> {
        let mut journal = self.journal.lock();
        let id = journal.sequence.next();
        let event = Arc::new(build(id));
        debug_assert_eq!(event.id(), id, "event built with a foreign id");
        journal.history.append(event.clone());
        self.broadcast(&event);
        event
    }

    /// Add a live subscriber. Dropping the returned handle unregisters it.
    pub fn register(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = prefixed_ulid(prefix::SUBSCRIBER);
        self.subscribers.insert(id.clone(), tx);
        tracing::debug!(subscriber_id = %id, "subscriber registered");
        Subscription {
            id,
            rx,
            subscribers: self.subscribers.clone(),
        }
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unregister(&self, subscriber_id: &str) -> bool {
        remove_subscriber(&self.subscribers, subscriber_id)
    }

    /// Drop every subscriber queue; their streams end once drained.
    pub fn disconnect_all(&self) -> usize {
        let count = self.subscribers.len();
        self.subscribers.clear();
        if count > 0 {
            tracing::info!(count, "disconnected all stream subscribers");
        }
        count
    }

    /// Deliver `event` to every registered subscriber without waiting.
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn broadcast(&self, event: &Arc<ChatEvent>) -> usize {
        let mut delivered = 0;
        let mut dropped = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber_id = %entry.key(),
                        event_id = event.id(),
                        "subscriber queue full, disconnecting"
                    );
                    dropped.push(entry.key().clone());
                }
                Err(TrySendError::Closed(_)) => dropped.push(entry.key().clone()),
            }
        }

        // Removal happens after iteration; DashMap shards are still read-locked inside it.
        for id in dropped {
            remove_subscriber(&self.subscribers, &id);
        }
        delivered
    }

    /// Pull query: the most recent `limit` events with `id > since_id`.
    pub fn query(&self, since_id: Option<u64>, limit: usize) -> FeedPage {
        let journal = self.journal.lock();
        let data = journal.history.snapshot(since_id, limit);
        let last_id = data
            .last()
            .map_or_else(|| journal.history.last_id(), |e| e.id());
        FeedPage { data, last_id }
    }

    /// Id of the newest retained event, or 0 if none.
    pub fn last_id(&self) -> u64 {
        self.journal.lock().history.last_id()
    }

    /// Id of the oldest retained event; rises once eviction starts.
    pub fn oldest_id(&self) -> Option<u64> {
        self.journal.lock().history.oldest_id()
    }

    pub fn history_len(&self) -> usize {
        self.journal.lock().history.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

fn remove_subscriber(subscribers: &SubscriberMap, subscriber_id: &str) -> bool {
    let removed = subscribers.remove(subscriber_id).is_some();
    if removed {
        tracing::debug!(%subscriber_id, "subscriber unregistered");
    }
    removed
}

/// A live subscriber's receiving end.
pub struct Subscription {
    id: String,
    rx: mpsc::Receiver<Arc<ChatEvent>>,
    subscribers: Arc<SubscriberMap>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next queued event. `None` once the hub has dropped this subscriber
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<ChatEvent>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        remove_subscriber(&self.subscribers, &self.id);
    }
}
