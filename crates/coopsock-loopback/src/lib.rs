//! # coopsock-loopback: in-process engine and host services
//!
//! Everything a `SocketLayer` needs to run without a network:
//!
//! | Trait             | Impl               | Notes                               |
//! |-------------------|--------------------|-------------------------------------|
//! | `TransportEngine` | `LoopbackEngine`   | TCP streams and UDP datagrams in RAM |
//! | `TickSource`      | `MonotonicClock`   | wall-clock ticks                    |
//! | `TickSource`      | `ManualClock`      | ticks advanced by hand              |
//! | `EntropySource`   | `XorShiftEntropy`  | xorshift64, seedable                |
//!
//! The engine also exposes fault-injection hooks (held handshakes, short
//! segments, connection resets) used by the layer's scenario tests.

pub mod clock;
pub mod entropy;
pub mod fabric;

pub use clock::{ManualClock, MonotonicClock};
pub use entropy::XorShiftEntropy;
pub use fabric::LoopbackEngine;
