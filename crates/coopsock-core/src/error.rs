//! Error types for the socket layer
//!
//! Every failure carries a classification (`ErrorKind`) and the BSD errno
//! a POSIX caller would see. The classification decides how the failure is
//! surfaced; the errno says what went wrong.

use core::fmt;
use nix::errno::Errno;

/// Result type for socket operations
pub type SockResult<T> = Result<T, SockError>;

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad handle, empty buffer, unsupported domain/type
    Parameter,

    /// Operation not valid in the socket's current lifecycle state
    State,

    /// Table exhausted, payload larger than the send buffer, send busy
    Resource,

    /// The engine reported reset/abort/timeout/refusal
    Transport,

    /// The socket was closed or recycled while the call waited on it
    Cancelled,

    /// Non-blocking call could not complete now
    WouldBlock,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Parameter => write!(f, "parameter"),
            ErrorKind::State => write!(f, "state"),
            ErrorKind::Resource => write!(f, "resource"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::WouldBlock => write!(f, "would block"),
        }
    }
}

/// A classified socket error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SockError {
    kind: ErrorKind,
    errno: Errno,
}

impl SockError {
    #[inline]
    pub const fn new(kind: ErrorKind, errno: Errno) -> Self {
        Self { kind, errno }
    }

    pub const fn parameter(errno: Errno) -> Self {
        Self::new(ErrorKind::Parameter, errno)
    }

    pub const fn state(errno: Errno) -> Self {
        Self::new(ErrorKind::State, errno)
    }

    pub const fn resource(errno: Errno) -> Self {
        Self::new(ErrorKind::Resource, errno)
    }

    pub const fn transport(errno: Errno) -> Self {
        Self::new(ErrorKind::Transport, errno)
    }

    /// "Not a socket": handle out of range or slot already closed
    pub const fn bad_handle() -> Self {
        Self::parameter(Errno::EBADF)
    }

    /// The waited-on socket was closed or recycled
    pub const fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, Errno::ECANCELED)
    }

    /// Nothing to do yet for a non-blocking caller
    pub const fn would_block() -> Self {
        Self::new(ErrorKind::WouldBlock, Errno::EAGAIN)
    }

    /// Non-blocking connect accepted by the engine, completion pending
    pub const fn in_progress() -> Self {
        Self::new(ErrorKind::WouldBlock, Errno::EINPROGRESS)
    }

    /// A previous send is still being transferred
    pub const fn busy() -> Self {
        Self::resource(Errno::EAGAIN)
    }

    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub const fn errno(&self) -> Errno {
        self.errno
    }

    /// Raw errno value
    #[inline]
    pub fn raw_os_error(&self) -> i32 {
        self.errno as i32
    }

    #[inline]
    pub fn is_would_block(&self) -> bool {
        self.kind == ErrorKind::WouldBlock
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl fmt::Display for SockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {} ({:?})", self.kind, self.errno.desc(), self.errno)
    }
}

impl std::error::Error for SockError {}

impl From<EngineError> for SockError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Cancelled => SockError::cancelled(),
            EngineError::AddrInUse => SockError::resource(Errno::EADDRINUSE),
            EngineError::Invalid => SockError::parameter(Errno::EINVAL),
            other => SockError::transport(other.errno()),
        }
    }
}

/// Failure reported by the transport engine
///
/// Engines report failures either synchronously from a primitive or as a
/// negative completion result (`-errno`). Both are folded into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// The operation was cancelled by a `cancel` primitive
    Cancelled,

    /// Peer reset the connection
    Reset,

    /// Connection aborted locally
    Aborted,

    /// Handshake or retransmission timed out
    TimedOut,

    /// Nobody accepted the connection
    Refused,

    /// No route to the remote endpoint
    Unreachable,

    /// Local endpoint already taken inside the engine
    AddrInUse,

    /// Engine rejected the arguments
    Invalid,

    /// Anything else, as a raw errno
    Other(i32),
}

impl EngineError {
    /// Errno reported to callers for this failure
    pub fn errno(&self) -> Errno {
        match self {
            EngineError::Cancelled => Errno::ECANCELED,
            EngineError::Reset => Errno::ECONNRESET,
            EngineError::Aborted => Errno::ECONNABORTED,
            EngineError::TimedOut => Errno::ETIMEDOUT,
            EngineError::Refused => Errno::ECONNREFUSED,
            EngineError::Unreachable => Errno::EHOSTUNREACH,
            EngineError::AddrInUse => Errno::EADDRINUSE,
            EngineError::Invalid => Errno::EINVAL,
            EngineError::Other(raw) => Errno::from_raw(*raw),
        }
    }

    /// Completion result encoding (`-errno`)
    pub fn as_result(&self) -> i64 {
        -(self.errno() as i64)
    }

    /// Decode a negative completion result
    ///
    /// Returns `None` for non-negative results.
    pub fn from_result(result: i64) -> Option<EngineError> {
        if result >= 0 {
            return None;
        }
        let raw = (-result) as i32;
        Some(match Errno::from_raw(raw) {
            Errno::ECANCELED => EngineError::Cancelled,
            Errno::ECONNRESET => EngineError::Reset,
            Errno::ECONNABORTED => EngineError::Aborted,
            Errno::ETIMEDOUT => EngineError::TimedOut,
            Errno::ECONNREFUSED => EngineError::Refused,
            Errno::EHOSTUNREACH => EngineError::Unreachable,
            Errno::EADDRINUSE => EngineError::AddrInUse,
            Errno::EINVAL => EngineError::Invalid,
            _ => EngineError::Other(raw),
        })
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Cancelled => write!(f, "operation cancelled"),
            EngineError::Reset => write!(f, "connection reset"),
            EngineError::Aborted => write!(f, "connection aborted"),
            EngineError::TimedOut => write!(f, "timed out"),
            EngineError::Refused => write!(f, "connection refused"),
            EngineError::Unreachable => write!(f, "host unreachable"),
            EngineError::AddrInUse => write!(f, "address in use"),
            EngineError::Invalid => write!(f, "invalid argument"),
            EngineError::Other(raw) => write!(f, "engine error: errno {}", raw),
        }
    }
}

impl std::error::Error for EngineError {}
