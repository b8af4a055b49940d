//! Tick sources

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use coopsock_core::TickSource;

/// Ticks of a fixed length since construction
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
    tick: Duration,
}

impl MonotonicClock {
    /// `tick` is clamped to at least one microsecond
    pub fn new(tick: Duration) -> Self {
        Self {
            origin: Instant::now(),
            tick: tick.max(Duration::from_micros(1)),
        }
    }

    /// One tick per millisecond
    pub fn millis() -> Self {
        Self::new(Duration::from_millis(1))
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::millis()
    }
}

impl TickSource for MonotonicClock {
    fn now_ticks(&self) -> u64 {
        (self.origin.elapsed().as_nanos() / self.tick.as_nanos()) as u64
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ticks: u64) -> u64 {
        self.ticks.fetch_add(ticks, Ordering::AcqRel) + ticks
    }

    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::Release);
    }
}

impl TickSource for ManualClock {
    fn now_ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }
}
