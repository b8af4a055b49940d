//! Layer counters

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct LayerStats {
    pub(crate) sockets_opened: AtomicU64,
    pub(crate) sockets_closed: AtomicU64,
    pub(crate) completions: AtomicU64,
    pub(crate) stale_completions: AtomicU64,
    pub(crate) bytes_sent: AtomicU64,
    pub(crate) bytes_received: AtomicU64,
    pub(crate) bytes_dropped: AtomicU64,
    pub(crate) parks: AtomicU64,
    pub(crate) duplicates: AtomicU64,
    pub(crate) rearm_failures: AtomicU64,
}

#[inline]
pub(crate) fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

impl LayerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            sockets_opened: get(&self.sockets_opened),
            sockets_closed: get(&self.sockets_closed),
            completions: get(&self.completions),
            stale_completions: get(&self.stale_completions),
            bytes_sent: get(&self.bytes_sent),
            bytes_received: get(&self.bytes_received),
            bytes_dropped: get(&self.bytes_dropped),
            parks: get(&self.parks),
            duplicates: get(&self.duplicates),
            rearm_failures: get(&self.rearm_failures),
        }
    }
}

/// Counter values at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sockets_opened: u64,
    pub sockets_closed: u64,
    /// Completions applied to a live socket or dropped as stale
    pub completions: u64,
    /// Completions for a closed or recycled slot
    pub stale_completions: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Received bytes that did not fit the ring
    pub bytes_dropped: u64,
    /// Times a caller parked in the blocking adapter
    pub parks: u64,
    /// Pending duplicates reserved by listeners
    pub duplicates: u64,
    /// Listener re-arms that found the table full
    pub rearm_failures: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sockets={}/{} completions={} (stale {}) tx={}B rx={}B dropped={}B parks={} dups={} rearm_fail={}",
            self.sockets_opened,
            self.sockets_closed,
            self.completions,
            self.stale_completions,
            self.bytes_sent,
            self.bytes_received,
            self.bytes_dropped,
            self.parks,
            self.duplicates,
            self.rearm_failures,
        )
    }
}
