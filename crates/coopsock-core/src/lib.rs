//! # coopsock-core
//!
//! Core types and traits for coopsock, a BSD-socket adaptation layer that
//! runs on top of an asynchronous, completion-driven TCP/UDP engine.
//!
//! This crate is engine-agnostic and holds no socket table state.
//! The table, buffers and blocking logic live in `coopsock`; a default
//! in-process engine lives in `coopsock-loopback`.
//!
//! ## Modules
//!
//! - `id` - Socket handle and creation id types
//! - `state` - Socket lifecycle state, transport and blocking mode
//! - `error` - Error taxonomy with errno classification
//! - `addr` - IPv4 socket address and `inet_addr` parsing
//! - `byteorder` - `htons`/`ntohs`/`htonl`/`ntohl`
//! - `entry` - Completion entries and correlation ids
//! - `engine` - Transport engine, tick and entropy traits
//! - `spinlock` - Table lock primitive
//! - `kprint` - Leveled stderr logging macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod error;
pub mod addr;
pub mod byteorder;
pub mod entry;
pub mod engine;
pub mod spinlock;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::{CreationId, SocketHandle};
pub use state::{BlockingMode, SocketState, Transport};
pub use error::{EngineError, ErrorKind, SockError, SockResult};
pub use addr::{inet_addr, SockAddrIn};
pub use byteorder::{htonl, htons, ntohl, ntohs};
pub use entry::{Completion, CorrId, OpKind, Payload};
pub use engine::{CompletionSink, EngineResult, EntropySource, Issued, TickSource, TransportEngine};
pub use spinlock::SpinLock;
pub use env::{env_get, env_get_bool, env_get_opt};

/// Errno values carried by `SockError`
pub use nix::errno::Errno;

/// BSD socket constants.
///
/// Values are taken from the host libc so handles and flags line up with
/// code written against `<sys/socket.h>`.
pub mod bsd {
    /// IPv4 address family
    pub const AF_INET: i32 = libc::AF_INET;

    /// Connection-oriented byte stream (TCP)
    pub const SOCK_STREAM: i32 = libc::SOCK_STREAM;

    /// Connectionless datagrams (UDP)
    pub const SOCK_DGRAM: i32 = libc::SOCK_DGRAM;

    /// `fcntl` command: read file status flags
    pub const F_GETFL: i32 = libc::F_GETFL;

    /// `fcntl` command: write file status flags
    pub const F_SETFL: i32 = libc::F_SETFL;

    /// Non-blocking flag for `F_SETFL`
    pub const O_NONBLOCK: i32 = libc::O_NONBLOCK;

    /// Maximum handles an `FdSet` can describe
    pub const FD_SETSIZE: usize = 256;

    /// First port of the IANA dynamic/private range
    pub const EPHEMERAL_PORT_MIN: u16 = 49152;

    /// Last port of the IANA dynamic/private range
    pub const EPHEMERAL_PORT_MAX: u16 = 65535;
}
