//! Bounded per-stream event queues.

use crate::SizedEvent;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

/// Queue for a single stream.
struct StreamQueue<E> {
    events: VecDeque<E>,
    /// Sum of `size_bytes()` over `events`.
    bytes: usize,
}

impl<E: SizedEvent> StreamQueue<E> {
    fn new() -> Self {
        Self {
            events: VecDeque::new(),
            bytes: 0,
        }
    }

    fn drain_front(&mut self, count: usize) -> Vec<E> {
        let events: Vec<E> = self.events.drain(..count).collect();
        let removed: usize = events.iter().map(SizedEvent::size_bytes).sum();
        self.bytes = self.bytes.saturating_sub(removed);
        events
    }
}

/// In-memory backlog of events keyed by stream name.
///
/// Each stream has its own FIFO queue bounded by `capacity`. Streams are
/// created on first `add` and are never removed, only emptied. All
/// operations on a stream run under that stream's lock, so `add` and
/// `take` never lose or duplicate events.
pub struct Backlog<E> {
    capacity: usize,
    streams: RwLock<HashMap<String, Arc<Mutex<StreamQueue<E>>>>>,
}

impl<E: SizedEvent> Backlog<E> {
    /// Create an empty backlog with the given per-stream capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Maximum number of events held per stream.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn queue(&self, stream: &str) -> Option<Arc<Mutex<StreamQueue<E>>>> {
        self.streams.read().get(stream).cloned()
    }

    fn get_or_create_queue(&self, stream: &str) -> Arc<Mutex<StreamQueue<E>>> {
        if let Some(queue) = self.queue(stream) {
            return queue;
        }

        let mut streams = self.streams.write();
        streams
            .entry(stream.to_string())
            .or_insert_with(|| {
                debug!(stream = %stream, "Created backlog queue");
                Arc::new(Mutex::new(StreamQueue::new()))
            })
            .clone()
    }

    /// Append an event to the back of a stream's queue.
    ///
    /// Returns `Err(event)` without side effects when the queue already
    /// holds `capacity` events, handing the event back to the caller.
    pub fn add(&self, stream: &str, event: E) -> Result<(), E> {
        let queue = self.get_or_create_queue(stream);
        let mut queue = queue.lock();

        if queue.events.len() >= self.capacity {
            trace!(stream = %stream, capacity = self.capacity, "Backlog full");
            return Err(event);
        }

        queue.bytes += event.size_bytes();
        queue.events.push_back(event);
        Ok(())
    }

    /// Like [`Backlog::add`], dropping the event when the queue is full.
    pub fn try_add(&self, stream: &str, event: E) -> bool {
        self.add(stream, event).is_ok()
    }

    /// Remove and return up to `max` events from the front of a stream.
    ///
    /// `None` drains the whole queue. Unknown streams yield an empty vec.
    pub fn take(&self, stream: &str, max: Option<usize>) -> Vec<E> {
        let Some(queue) = self.queue(stream) else {
            return Vec::new();
        };
        let mut queue = queue.lock();

        let count = match max {
            Some(max) => max.min(queue.events.len()),
            None => queue.events.len(),
        };
        queue.drain_front(count)
    }

    /// Whether a stream has no queued events (unknown streams are empty).
    pub fn is_empty(&self, stream: &str) -> bool {
        self.len(stream) == 0
    }

    /// Number of events queued for a stream.
    pub fn len(&self, stream: &str) -> usize {
        self.queue(stream).map_or(0, |queue| queue.lock().events.len())
    }

    /// Estimated serialized size of a stream's queued events.
    pub fn byte_size(&self, stream: &str) -> usize {
        self.queue(stream).map_or(0, |queue| queue.lock().bytes)
    }

    /// Length and byte size of a stream, read under a single lock.
    pub fn stats(&self, stream: &str) -> (usize, usize) {
        self.queue(stream).map_or((0, 0), |queue| {
            let queue = queue.lock();
            (queue.events.len(), queue.bytes)
        })
    }

    /// Snapshot of the stream names known at call time.
    pub fn keys(&self) -> Vec<String> {
        self.streams.read().keys().cloned().collect()
    }

    /// Total number of queued events across all streams.
    pub fn total_len(&self) -> usize {
        let queues: Vec<_> = self.streams.read().values().cloned().collect();
        queues.iter().map(|queue| queue.lock().events.len()).sum()
    }

    /// Whether every stream is empty.
    pub fn all_empty(&self) -> bool {
        self.total_len() == 0
    }
}

impl<E: SizedEvent + Clone> Backlog<E> {
    /// Copy of a stream's queued events, front first. Does not mutate.
    pub fn get(&self, stream: &str) -> Vec<E> {
        self.queue(stream).map_or_else(Vec::new, |queue| {
            queue.lock().events.iter().cloned().collect()
        })
    }
}
