//! Completion queue
//!
//! Bounded lock-free MPSC queue between the transport engine and the
//! socket layer. Engines push from any context; the layer pops while it
//! holds the table lock. Every successful push bumps the parking epoch so
//! blocked callers re-check their condition.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_queue::ArrayQueue;

use coopsock_core::{Completion, CompletionSink};

use crate::parking::{new_parking, EventParking};

pub struct CompletionQueue {
    queue: ArrayQueue<Completion>,
    parking: Box<dyn EventParking>,
    posted: AtomicU64,
    rejected: AtomicU64,
}

impl CompletionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            parking: new_parking(),
            posted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn pop(&self) -> Option<Completion> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Epoch to pass to `park` after the caller's condition check
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.parking.epoch()
    }

    /// Sleep until something is posted or `timeout` elapses
    #[inline]
    pub fn park(&self, seen: u32, timeout: Duration) -> bool {
        self.parking.park(seen, timeout)
    }

    /// Completions accepted so far
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }

    /// Pushes refused because the queue was full
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl CompletionSink for CompletionQueue {
    fn push(&self, completion: Completion) -> Result<(), Completion> {
        match self.queue.push(completion) {
            Ok(()) => {
                self.posted.fetch_add(1, Ordering::Relaxed);
                self.parking.notify_all();
                Ok(())
            }
            Err(completion) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Err(completion)
            }
        }
    }

    fn notify(&self) {
        self.parking.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coopsock_core::{CorrId, CreationId, OpKind, SocketHandle};

    fn completion(slot: u32) -> Completion {
        let corr = CorrId::new(SocketHandle::new(slot), CreationId::new(1));
        Completion::ok(corr, OpKind::Close, 0)
    }

    #[test]
    fn test_push_pop_fifo() {
        let q = CompletionQueue::new(4);
        q.push(completion(1)).unwrap();
        q.push(completion(2)).unwrap();

        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().unwrap().corr.slot(), 1);
        assert_eq!(q.pop().unwrap().corr.slot(), 2);
        assert!(q.pop().is_none());
        assert_eq!(q.posted(), 2);
    }

    #[test]
    fn test_full_queue_hands_back() {
        let q = CompletionQueue::new(1);
        q.push(completion(1)).unwrap();

        let back = q.push(completion(2)).unwrap_err();
        assert_eq!(back.corr.slot(), 2);
        assert_eq!(q.rejected(), 1);
    }

    #[test]
    fn test_push_moves_epoch() {
        let q = CompletionQueue::new(2);
        let seen = q.epoch();
        q.push(completion(0)).unwrap();
        assert_ne!(q.epoch(), seen);
        assert!(q.park(seen, Duration::from_secs(5)));
    }
}
