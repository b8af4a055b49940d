//! # coopsock
//!
//! BSD-socket adaptation layer over an asynchronous, completion-driven
//! TCP/UDP transport engine.
//!
//! ## Architecture
//!
//! ```text
//! caller thread(s)                         engine context
//! ┌─────────────────────────┐              ┌──────────────────────┐
//! │ socket/bind/connect/... │  primitives  │   TransportEngine    │
//! │        SocketLayer      │ ───────────► │ (never blocks, never │
//! │                         │              │  calls back into us) │
//! │  blocking adapter       │              └──────────┬───────────┘
//! │  park(epoch) ◄──wake────┼───┐                     │ push
//! └────────────┬────────────┘   │          ┌──────────▼───────────┐
//!              │ drain          └──────────┤   CompletionQueue    │
//!              ▼                           │  (ArrayQueue, MPSC)  │
//! ┌─────────────────────────┐  pop         └──────────────────────┘
//! │ SpinLock<SocketTable>   │◄────────────────────────┘
//! │  SCB: state, ring, ...  │  callback bridge applies each completion
//! └─────────────────────────┘  under the table lock, in post order
//! ```
//!
//! Completions never touch the table directly. Every API call and every
//! waiter drains the queue under the table lock before looking at socket
//! state, so per-socket completion order is the order the engine posted.
//! A waiter remembers its socket's creation id; if the slot is closed or
//! recycled while it sleeps, the wait ends with `ECANCELED`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use coopsock::{LayerConfig, SocketLayer};
//! use coopsock_core::bsd::{AF_INET, SOCK_STREAM};
//!
//! let layer = SocketLayer::open(LayerConfig::from_env(), clock, entropy, MyEngine::new)?;
//! let h = layer.socket(AF_INET, SOCK_STREAM)?;
//! layer.connect(h, "10.0.0.5:80".parse()?)?;
//! layer.send(h, b"GET / HTTP/1.0\r\n\r\n")?;
//! ```

pub mod config;
pub mod parking;
pub mod completion;
pub mod ring;
pub mod scb;
pub mod table;
pub mod ports;
pub mod select;
pub mod stats;

mod layer;
mod bridge;
mod blocking;
mod acceptor;

pub use config::{ConfigError, LayerConfig};
pub use completion::CompletionQueue;
pub use layer::SocketLayer;
pub use scb::{Role, ScbSnapshot};
pub use select::FdSet;
pub use stats::StatsSnapshot;

pub use coopsock_core::bsd;

pub use coopsock_core::{
    htonl, htons, inet_addr, ntohl, ntohs, BlockingMode, Errno, ErrorKind, SockAddrIn, SockError,
    SockResult, SocketHandle, SocketState, Transport,
};
