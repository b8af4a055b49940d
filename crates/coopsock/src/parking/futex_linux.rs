//! Linux futex-based parking
//!
//! The futex word is the event epoch itself. `FUTEX_WAIT` only sleeps
//! while the word still equals the epoch the waiter saw, so a bump that
//! races with the park makes the syscall return `EAGAIN` at once.

use super::EventParking;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

pub struct FutexParking {
    /// Event epoch, also the futex word
    epoch: AtomicU32,

    /// Count of parked waiters
    parked: AtomicUsize,
}

impl FutexParking {
    pub fn new() -> Self {
        Self {
            epoch: AtomicU32::new(0),
            parked: AtomicUsize::new(0),
        }
    }
}

impl Default for FutexParking {
    fn default() -> Self {
        Self::new()
    }
}

impl EventParking for FutexParking {
    fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    fn park(&self, seen: u32, timeout: Duration) -> bool {
        self.parked.fetch_add(1, Ordering::SeqCst);

        if self.epoch.load(Ordering::SeqCst) != seen {
            self.parked.fetch_sub(1, Ordering::SeqCst);
            return true;
        }

        let ts = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as libc::c_long,
        };

        // Sleeps only while the word still equals `seen`
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.epoch.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                seen,
                &ts as *const libc::timespec,
                std::ptr::null::<u32>(),
                0u32,
            );
        }

        self.parked.fetch_sub(1, Ordering::SeqCst);

        // ETIMEDOUT, EAGAIN and EINTR all land here; the epoch is the truth
        self.epoch.load(Ordering::Acquire) != seen
    }

    fn notify_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        if self.parked.load(Ordering::SeqCst) == 0 {
            return;
        }

        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.epoch.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                i32::MAX,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
