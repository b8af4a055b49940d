//! Socket lifecycle state, transport and blocking mode

use core::fmt;

/// Lifecycle state of a socket control block
///
/// ```text
/// Closed → Created → { Bound → Listening | Connecting } → Connected → Closing → Closed
///                         any active state → FatalError
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SocketState {
    /// Slot is free
    Closed = 0,

    /// Allocated by `socket()`, nothing else done
    Created = 1,

    /// Local endpoint assigned
    Bound = 2,

    /// Accepting inbound connections through a pending duplicate
    Listening = 3,

    /// Handshake issued, waiting for the engine
    Connecting = 4,

    /// Established (TCP) or default peer set (UDP)
    Connected = 5,

    /// Peer has closed its write side; buffered data can still be drained
    Closing = 6,

    /// The engine reported a transport failure
    FatalError = 7,
}

impl SocketState {
    /// Slot is in use (anything but `Closed`)
    #[inline]
    pub const fn is_allocated(&self) -> bool {
        !matches!(self, SocketState::Closed)
    }

    /// Data may flow on this socket
    #[inline]
    pub const fn is_established(&self) -> bool {
        matches!(self, SocketState::Connected | SocketState::Closing)
    }

    /// Every call except `close()` must fail
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, SocketState::FatalError)
    }

    /// Short name used in log lines
    pub const fn name(&self) -> &'static str {
        match self {
            SocketState::Closed => "CLOSED",
            SocketState::Created => "CREATED",
            SocketState::Bound => "BOUND",
            SocketState::Listening => "LISTENING",
            SocketState::Connecting => "CONNECTING",
            SocketState::Connected => "CONNECTED",
            SocketState::Closing => "CLOSING",
            SocketState::FatalError => "FATAL_ERROR",
        }
    }
}

impl From<u8> for SocketState {
    fn from(v: u8) -> Self {
        match v {
            1 => SocketState::Created,
            2 => SocketState::Bound,
            3 => SocketState::Listening,
            4 => SocketState::Connecting,
            5 => SocketState::Connected,
            6 => SocketState::Closing,
            7 => SocketState::FatalError,
            _ => SocketState::Closed,
        }
    }
}

impl Default for SocketState {
    fn default() -> Self {
        SocketState::Closed
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transport protocol of a table region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Transport {
    Tcp = 0,
    Udp = 1,
}

impl Transport {
    /// Map a BSD socket type to a transport
    pub fn from_socket_type(ty: i32) -> Option<Transport> {
        if ty == crate::bsd::SOCK_STREAM {
            Some(Transport::Tcp)
        } else if ty == crate::bsd::SOCK_DGRAM {
            Some(Transport::Udp)
        } else {
            None
        }
    }

    #[inline]
    pub const fn is_tcp(&self) -> bool {
        matches!(self, Transport::Tcp)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::Udp => write!(f, "udp"),
        }
    }
}

/// Whether calls on a socket may suspend the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingMode {
    Blocking,
    NonBlocking,
}

impl BlockingMode {
    #[inline]
    pub const fn is_blocking(&self) -> bool {
        matches!(self, BlockingMode::Blocking)
    }
}

impl Default for BlockingMode {
    fn default() -> Self {
        BlockingMode::Blocking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(!SocketState::Closed.is_allocated());
        assert!(SocketState::Created.is_allocated());

        assert!(SocketState::Connected.is_established());
        assert!(SocketState::Closing.is_established());
        assert!(!SocketState::Connecting.is_established());

        assert!(SocketState::FatalError.is_fatal());
        assert!(!SocketState::Listening.is_fatal());
    }

    #[test]
    fn test_state_u8_round() {
        for v in 0u8..8 {
            assert_eq!(SocketState::from(v) as u8, v);
        }
        assert_eq!(SocketState::from(200), SocketState::Closed);
    }

    #[test]
    fn test_transport_from_type() {
        assert_eq!(Transport::from_socket_type(crate::bsd::SOCK_STREAM), Some(Transport::Tcp));
        assert_eq!(Transport::from_socket_type(crate::bsd::SOCK_DGRAM), Some(Transport::Udp));
        assert_eq!(Transport::from_socket_type(-5), None);
    }

    #[test]
    fn test_default_blocking() {
        assert!(BlockingMode::default().is_blocking());
    }
}
