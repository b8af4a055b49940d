//! Ephemeral port allocation
//!
//! Ports are drawn uniformly from the IANA dynamic range. A draw that
//! collides with an active socket of the same transport is thrown away;
//! after `attempts` collisions the allocator gives up with
//! `EADDRNOTAVAIL` instead of sweeping the range.

use coopsock_core::bsd::{EPHEMERAL_PORT_MAX, EPHEMERAL_PORT_MIN};
use coopsock_core::{EntropySource, Errno, SockError, SockResult};

/// Size of the ephemeral range
const RANGE: u32 = (EPHEMERAL_PORT_MAX - EPHEMERAL_PORT_MIN) as u32 + 1;

pub struct PortAllocator {
    entropy: Box<dyn EntropySource>,
    attempts: u32,
}

impl PortAllocator {
    pub fn new(entropy: Box<dyn EntropySource>, attempts: u32) -> Self {
        Self { entropy, attempts }
    }

    /// One uniform draw from the range
    #[inline]
    fn draw(&mut self) -> u16 {
        // RANGE is 2^14, so the modulo keeps the draw uniform
        EPHEMERAL_PORT_MIN + (self.entropy.next_u32() % RANGE) as u16
    }

    /// Pick a port for which `in_use` is false
    pub fn allocate(&mut self, in_use: impl Fn(u16) -> bool) -> SockResult<u16> {
        for _ in 0..self.attempts {
            let port = self.draw();
            if !in_use(port) {
                return Ok(port);
            }
        }
        Err(SockError::resource(Errno::EADDRNOTAVAIL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(values: Vec<u32>) -> Box<dyn EntropySource> {
        let mut iter = values.into_iter().cycle();
        Box::new(move || iter.next().unwrap_or(0))
    }

    #[test]
    fn test_draw_stays_in_range() {
        let mut ports = PortAllocator::new(sequence(vec![0, RANGE - 1, RANGE, u32::MAX]), 4);
        for _ in 0..4 {
            let p = ports.allocate(|_| false).unwrap();
            assert!((EPHEMERAL_PORT_MIN..=EPHEMERAL_PORT_MAX).contains(&p));
        }
    }

    #[test]
    fn test_redraw_on_collision() {
        let mut ports = PortAllocator::new(sequence(vec![5, 5, 9]), 3);
        let p = ports.allocate(|p| p == EPHEMERAL_PORT_MIN + 5).unwrap();
        assert_eq!(p, EPHEMERAL_PORT_MIN + 9);
    }

    #[test]
    fn test_exhaustion() {
        let mut ports = PortAllocator::new(sequence(vec![1]), 16);
        let err = ports.allocate(|_| true).unwrap_err();
        assert_eq!(err.errno(), Errno::EADDRNOTAVAIL);
        assert_eq!(err.kind(), coopsock_core::ErrorKind::Resource);
    }
}
