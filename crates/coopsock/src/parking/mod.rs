//! Waiter parking
//!
//! Threads inside the blocking adapter sleep here until the completion
//! queue moves. Waking is keyed by an event epoch: a waiter reads the epoch,
//! re-checks its condition, then parks only if the epoch still holds the
//! value it saw. Any post to the completion queue bumps the epoch, so a
//! completion that lands between the check and the park is never missed.

use std::time::Duration;

/// Platform-specific epoch parking
pub trait EventParking: Send + Sync {
    /// Current event epoch
    fn epoch(&self) -> u32;

    /// Sleep until the epoch moves away from `seen` or `timeout` elapses
    ///
    /// Returns `true` if the epoch moved. Callers re-check their condition
    /// regardless of the return value.
    fn park(&self, seen: u32, timeout: Duration) -> bool;

    /// Bump the epoch and wake every parked waiter
    fn notify_all(&self);

    /// Number of currently parked waiters (hint, may be stale)
    fn parked_count(&self) -> usize;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        mod fallback;
        pub use fallback::FallbackParking as PlatformParking;
    }
}

/// Create a new platform-appropriate parking instance
pub fn new_parking() -> Box<dyn EventParking> {
    Box::new(PlatformParking::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_park_timeout() {
        let parking = new_parking();
        let seen = parking.epoch();
        let start = Instant::now();
        let moved = parking.park(seen, Duration::from_millis(30));

        assert!(!moved);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_stale_epoch_returns_immediately() {
        let parking = new_parking();
        let seen = parking.epoch();
        parking.notify_all();

        let start = Instant::now();
        assert!(parking.park(seen, Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_notify_wakes_parked_waiter() {
        let parking = Arc::new(PlatformParking::new());
        let parking2 = Arc::clone(&parking);
        let seen = parking.epoch();

        let handle = thread::spawn(move || parking2.park(seen, Duration::from_secs(10)));

        // Give the waiter time to park
        thread::sleep(Duration::from_millis(50));
        parking.notify_all();

        assert!(handle.join().unwrap());
        assert_eq!(parking.parked_count(), 0);
    }
}
