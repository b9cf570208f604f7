//! TTL-bounded FIFO of frames waiting for the link.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::core::constants::QUEUE_TTL;

/// A payload waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFrame {
    /// Queue-assigned id, increasing in insertion order.
    pub id: u64,
    /// Frame payload, without terminator.
    pub payload: Vec<u8>,
    /// When the frame was queued.
    pub enqueued_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<PendingFrame>,
    next_id: u64,
    dropped: u64,
}

impl Inner {
    /// Remove expired entries from the head.
    ///
    /// Insertion order is age order, so the walk stops at the first fresh entry.
    fn purge(&mut self, now: Instant, ttl: Duration) -> usize {
        let mut purged = 0;
        while let Some(head) = self.entries.front() {
            if now.saturating_duration_since(head.enqueued_at) >= ttl {
                self.entries.pop_front();
                purged += 1;
            } else {
                break;
            }
        }
        if purged > 0 {
            self.dropped += purged as u64;
            debug!(purged, remaining = self.entries.len(), "dropped expired frames");
        }
        purged
    }
}

/// Outbound queue shared between producers and the flush routine.
///
/// All operations take the lock for a purge plus one mutation, so producers
/// and the flusher never observe a half-updated queue. Expiry is a silent
/// drop, never an error.
#[derive(Debug)]
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundQueue {
    /// Create a queue with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(QUEUE_TTL)
    }

    /// Create a queue with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
        }
    }

    /// Entry time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Queue `payload` now.
    pub fn enqueue(&self, payload: Vec<u8>) -> u64 {
        self.enqueue_at(payload, Instant::now())
    }

    /// Queue `payload` at `now`, purging expired entries first.
    pub fn enqueue_at(&self, payload: Vec<u8>, now: Instant) -> u64 {
        let mut inner = self.inner.lock();
        inner.purge(now, self.ttl);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push_back(PendingFrame {
            id,
            payload,
            enqueued_at: now,
        });
        id
    }

    /// Purge expired entries and return a copy of the head, if any.
    pub fn peek_ready_at(&self, now: Instant) -> Option<PendingFrame> {
        let mut inner = self.inner.lock();
        inner.purge(now, self.ttl);
        inner.entries.front().cloned()
    }

    /// Remove the head if it is still entry `id`.
    ///
    /// Returns `false` when the head changed in between, e.g. because it
    /// expired and was purged by a producer.
    pub fn complete(&self, id: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.entries.front().is_some_and(|head| head.id == id) {
            inner.entries.pop_front();
            true
        } else {
            false
        }
    }

    /// Purge and count the remaining entries.
    pub fn len_at(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        inner.purge(now, self.ttl);
        inner.entries.len()
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.len_at(Instant::now())
    }

    /// Whether nothing is waiting at `now`.
    pub fn is_empty_at(&self, now: Instant) -> bool {
        self.len_at(now) == 0
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total entries dropped by expiry.
    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }

    /// Payloads currently queued, head first, without purging.
    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|e| e.payload.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_fifo_order() {
        let queue = OutboundQueue::new();
        let t0 = Instant::now();
        queue.enqueue_at(b"o1".to_vec(), t0);
        queue.enqueue_at(b"o2".to_vec(), t0);
        queue.enqueue_at(b"o3".to_vec(), t0);

        let mut sent = Vec::new();
        while let Some(head) = queue.peek_ready_at(t0) {
            assert!(queue.complete(head.id));
            sent.push(head.payload);
        }
        assert_eq!(sent, vec![b"o1".to_vec(), b"o2".to_vec(), b"o3".to_vec()]);
    }

    #[test]
    fn test_entry_absent_after_ttl() {
        let queue = OutboundQueue::new();
        let t0 = Instant::now();
        queue.enqueue_at(b"late".to_vec(), t0);

        assert_eq!(queue.len_at(t0 + secs(59)), 1);
        assert_eq!(queue.len_at(t0 + secs(61)), 0);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_entry_expires_exactly_at_ttl() {
        let queue = OutboundQueue::new();
        let t0 = Instant::now();
        queue.enqueue_at(b"edge".to_vec(), t0);

        assert!(queue.peek_ready_at(t0 + QUEUE_TTL - Duration::from_millis(1)).is_some());
        assert_eq!(queue.len_at(t0 + QUEUE_TTL), 0);
        assert!(queue.peek_ready_at(t0 + QUEUE_TTL).is_none());
    }

    #[test]
    fn test_enqueue_purges_stale_head() {
        let queue = OutboundQueue::with_ttl(secs(10));
        let t0 = Instant::now();
        queue.enqueue_at(b"old".to_vec(), t0);
        queue.enqueue_at(b"mid".to_vec(), t0 + secs(5));
        queue.enqueue_at(b"new".to_vec(), t0 + secs(12));

        assert_eq!(queue.snapshot(), vec![b"mid".to_vec(), b"new".to_vec()]);
    }

    #[test]
    fn test_flush_skips_only_expired() {
        let queue = OutboundQueue::with_ttl(secs(60));
        let t0 = Instant::now();
        queue.enqueue_at(b"o1".to_vec(), t0);
        queue.enqueue_at(b"o2".to_vec(), t0 + secs(30));
        queue.enqueue_at(b"o3".to_vec(), t0 + secs(40));

        let flush_at = t0 + secs(70);
        let mut sent = Vec::new();
        while let Some(head) = queue.peek_ready_at(flush_at) {
            queue.complete(head.id);
            sent.push(head.payload);
        }
        assert_eq!(sent, vec![b"o2".to_vec(), b"o3".to_vec()]);
    }

    #[test]
    fn test_complete_ignores_replaced_head() {
        let queue = OutboundQueue::with_ttl(secs(1));
        let t0 = Instant::now();
        queue.enqueue_at(b"a".to_vec(), t0);
        let head = queue.peek_ready_at(t0).unwrap();

        // Head expires and a producer pushes a new frame before the send completes.
        queue.enqueue_at(b"b".to_vec(), t0 + secs(2));
        assert!(!queue.complete(head.id));
        assert_eq!(queue.snapshot(), vec![b"b".to_vec()]);
    }

    #[test]
    fn test_ids_increase() {
        let queue = OutboundQueue::new();
        let a = queue.enqueue(b"a".to_vec());
        let b = queue.enqueue(b"b".to_vec());
        assert!(b > a);
        assert!(!queue.is_empty());
    }
}
