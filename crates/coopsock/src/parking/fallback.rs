//! Condvar-based parking for platforms without futex

use super::EventParking;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub struct FallbackParking {
    /// Event epoch
    epoch: Mutex<u32>,

    condvar: Condvar,

    /// Count of parked waiters
    parked: AtomicUsize,
}

impl FallbackParking {
    pub fn new() -> Self {
        Self {
            epoch: Mutex::new(0),
            condvar: Condvar::new(),
            parked: AtomicUsize::new(0),
        }
    }

    // A panicking waiter cannot leave the epoch inconsistent
    fn locked(&self) -> MutexGuard<'_, u32> {
        self.epoch.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FallbackParking {
    fn default() -> Self {
        Self::new()
    }
}

impl EventParking for FallbackParking {
    fn epoch(&self) -> u32 {
        *self.locked()
    }

    fn park(&self, seen: u32, timeout: Duration) -> bool {
        self.parked.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + timeout;

        let mut guard = self.locked();
        while *guard == seen {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            guard = match self.condvar.wait_timeout(guard, deadline - now) {
                Ok((g, _)) => g,
                Err(e) => e.into_inner().0,
            };
        }
        let moved = *guard != seen;
        drop(guard);

        self.parked.fetch_sub(1, Ordering::SeqCst);
        moved
    }

    fn notify_all(&self) {
        {
            let mut guard = self.locked();
            *guard = guard.wrapping_add(1);
        }
        if self.parked.load(Ordering::Acquire) > 0 {
            self.condvar.notify_all();
        }
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
