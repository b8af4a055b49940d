//! Transport engine abstraction.
//!
//! A `TransportEngine` is the asynchronous TCP/UDP library the socket layer
//! adapts. The layer drives it only through the primitives below; windowing,
//! retransmission and the rest of the protocol stay inside the engine.
//!
//! Every primitive returns one of:
//!
//! - `Ok(Issued::Complete(c))`: finished synchronously, `c` is the result
//! - `Ok(Issued::Pending)`: accepted; a `Completion` will be pushed into the
//!   engine's `CompletionSink` later, possibly from another thread
//! - `Err(e)`: rejected synchronously, nothing is outstanding
//!
//! **Contract:** primitives must never block and must never call back into
//! the socket layer. Results flow back only through the sink.

use crate::addr::SockAddrIn;
use crate::entry::{Completion, CorrId};
use crate::error::EngineError;
use crate::state::Transport;

/// Result type for engine primitives
pub type EngineResult<T> = Result<T, EngineError>;

/// Outcome of issuing a primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issued {
    /// Finished inline
    Complete(Completion),
    /// A completion will be posted
    Pending,
}

/// Receives completions from the engine.
///
/// The socket layer owns the implementation (a bounded queue plus a wake
/// primitive). Engines hold an `Arc<dyn CompletionSink>`.
pub trait CompletionSink: Send + Sync {
    /// Post a completion. Never blocks.
    ///
    /// Returns the completion back if the queue is full; the engine keeps it
    /// and retries from `TransportEngine::poll`.
    fn push(&self, completion: Completion) -> Result<(), Completion>;

    /// Wake waiters without posting anything.
    fn notify(&self);
}

/// Asynchronous TCP/UDP primitives.
///
/// The engine identifies sockets by `CorrId::handle`. A `CorrId` with a new
/// `creation` for a known handle means the slot was recycled: the engine
/// must forget whatever it kept for the previous incarnation.
pub trait TransportEngine: Send + Sync {
    /// Register a local endpoint (bind). Synchronous.
    fn open(&self, corr: CorrId, transport: Transport, local: SockAddrIn) -> EngineResult<()>;

    /// Start a TCP handshake, or set the default peer of a UDP endpoint.
    fn connect(
        &self,
        corr: CorrId,
        transport: Transport,
        local: SockAddrIn,
        remote: SockAddrIn,
    ) -> EngineResult<Issued>;

    /// Wait for one inbound TCP connection on `local`, delivered to `corr`.
    fn accept(&self, corr: CorrId, local: SockAddrIn) -> EngineResult<Issued>;

    /// Transmit `data`. May complete with fewer bytes than requested.
    ///
    /// The engine copies what it needs before returning.
    fn send(
        &self,
        corr: CorrId,
        transport: Transport,
        data: &[u8],
        to: Option<SockAddrIn>,
    ) -> EngineResult<Issued>;

    /// Request up to `max_len` bytes. A TCP completion with zero bytes
    /// means the peer closed its write side.
    fn receive(&self, corr: CorrId, transport: Transport, max_len: usize) -> EngineResult<Issued>;

    /// Release the endpoint.
    fn close(&self, corr: CorrId, transport: Transport) -> EngineResult<Issued>;

    /// Abort every outstanding operation of `corr`. Each aborted operation
    /// completes with `-ECANCELED`; the cancel itself completes as
    /// `OpKind::Cancel`.
    fn cancel(&self, corr: CorrId, transport: Transport) -> EngineResult<Issued>;

    /// Give a cooperative engine a chance to make progress.
    ///
    /// Called by waiters between checks. Default: nothing to do.
    fn poll(&self) {}
}

/// Periodic tick source used for `select` timeouts
pub trait TickSource: Send + Sync {
    /// Monotonic tick counter
    fn now_ticks(&self) -> u64;
}

/// Random numbers for ephemeral port selection
pub trait EntropySource: Send {
    fn next_u32(&mut self) -> u32;
}

impl<F> EntropySource for F
where
    F: FnMut() -> u32 + Send,
{
    fn next_u32(&mut self) -> u32 {
        self()
    }
}
