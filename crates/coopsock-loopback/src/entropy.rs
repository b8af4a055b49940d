//! Pseudo-random source for ephemeral ports

use std::time::{SystemTime, UNIX_EPOCH};

use coopsock_core::EntropySource;

const FALLBACK_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// xorshift64. Not cryptographic; ports only need to be spread out.
#[derive(Debug, Clone)]
pub struct XorShiftEntropy {
    state: u64,
}

impl XorShiftEntropy {
    /// A zero seed would stick at zero and is replaced
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { FALLBACK_SEED } else { seed },
        }
    }

    /// Seeded from the system clock
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(FALLBACK_SEED);
        Self::new(nanos)
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl EntropySource for XorShiftEntropy {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_seed() {
        let mut a = XorShiftEntropy::new(42);
        let mut b = XorShiftEntropy::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_zero_seed_moves() {
        let mut e = XorShiftEntropy::new(0);
        let first = e.next_u64();
        assert_ne!(first, 0);
        assert_ne!(e.next_u64(), first);
    }

    #[test]
    fn test_spread_over_port_range() {
        let mut e = XorShiftEntropy::new(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            seen.insert(e.next_u32() % 16384);
        }
        assert!(seen.len() > 900);
    }
}
