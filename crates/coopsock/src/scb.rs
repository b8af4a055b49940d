//! Socket control block
//!
//! One SCB per table slot. The blocks are allocated once when the layer
//! opens and reused; `reset()` returns a block to `Closed` without
//! touching its buffers' allocations.

use coopsock_core::{
    BlockingMode, CorrId, CreationId, Errno, OpKind, SockAddrIn, SockError, SocketHandle,
    SocketState, Transport,
};

use crate::ring::{RecvRing, SendBuffer};

/// Part a socket plays in listen/accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Ordinary socket
    #[default]
    Plain,
    /// `peer_slot` is the pending duplicate
    Listener,
    /// Pending duplicate; `peer_slot` is the listener
    Duplicate,
}

pub struct Scb {
    pub state: SocketState,
    pub transport: Transport,
    pub role: Role,
    pub local: Option<SockAddrIn>,
    pub remote: Option<SockAddrIn>,
    pub blocking: BlockingMode,
    pub creation: CreationId,
    pub ring: RecvRing,
    pub sendbuf: SendBuffer,
    /// `OpKind::bit()` mask of outstanding engine operations
    pub in_flight: u8,
    pub peer_slot: SocketHandle,
    pub last_error: Option<SockError>,
    /// Transport failure that put the socket in `FatalError`
    pub fatal_errno: Option<Errno>,
    pub fin_received: bool,
    /// Listener's ready duplicate already reported by `select`
    pub accept_seen: bool,
    /// Connect completed and not yet reported by `select`
    pub connect_event: bool,
    pub close_pending: bool,
    /// Source of the most recent datagram
    pub udp_from: Option<SockAddrIn>,
    /// Destination of the datagram in the send buffer
    pub send_to: Option<SockAddrIn>,
}

impl Scb {
    pub fn new(transport: Transport, recv_capacity: usize, send_capacity: usize) -> Self {
        Self {
            state: SocketState::Closed,
            transport,
            role: Role::Plain,
            local: None,
            remote: None,
            blocking: BlockingMode::Blocking,
            creation: CreationId::UNSET,
            ring: RecvRing::new(recv_capacity),
            sendbuf: SendBuffer::new(send_capacity),
            in_flight: 0,
            peer_slot: SocketHandle::NONE,
            last_error: None,
            fatal_errno: None,
            fin_received: false,
            accept_seen: false,
            connect_event: false,
            close_pending: false,
            udp_from: None,
            send_to: None,
        }
    }

    /// Back to `Closed`. The creation id is kept so late completions for
    /// this incarnation are still recognized as stale.
    pub fn reset(&mut self) {
        self.state = SocketState::Closed;
        self.role = Role::Plain;
        self.local = None;
        self.remote = None;
        self.blocking = BlockingMode::Blocking;
        self.ring.clear();
        self.sendbuf.reset();
        self.in_flight = 0;
        self.peer_slot = SocketHandle::NONE;
        self.last_error = None;
        self.fatal_errno = None;
        self.fin_received = false;
        self.accept_seen = false;
        self.connect_event = false;
        self.close_pending = false;
        self.udp_from = None;
        self.send_to = None;
    }

    #[inline]
    pub fn corr(&self, handle: SocketHandle) -> CorrId {
        CorrId::new(handle, self.creation)
    }

    #[inline]
    pub fn has_op(&self, op: OpKind) -> bool {
        self.in_flight & op.bit() != 0
    }

    #[inline]
    pub fn set_op(&mut self, op: OpKind) {
        self.in_flight |= op.bit();
    }

    #[inline]
    pub fn clear_op(&mut self, op: OpKind) {
        self.in_flight &= !op.bit();
    }

    /// A receive request may be outstanding in this state
    ///
    /// UDP buffers one datagram at a time: the next receive is posted once
    /// the ring is drained, so a datagram is never cut at the wrap point.
    pub fn can_receive(&self) -> bool {
        if self.close_pending || self.has_op(OpKind::Receive) || self.ring.contiguous_free() == 0 {
            return false;
        }
        match self.transport {
            Transport::Tcp => self.state == SocketState::Connected,
            Transport::Udp => {
                self.ring.is_empty()
                    && self.local.is_some()
                    && matches!(self.state, SocketState::Bound | SocketState::Connected)
            }
        }
    }

    /// Size of the next receive request
    pub fn receive_len(&self) -> usize {
        match self.transport {
            Transport::Tcp => self.ring.contiguous_free(),
            Transport::Udp => self.ring.free(),
        }
    }

    /// Error surfaced by calls on a `FatalError` socket
    pub fn fatal_error(&self) -> SockError {
        SockError::state(self.fatal_errno.unwrap_or(Errno::EIO))
    }

    pub fn snapshot(&self, handle: SocketHandle) -> ScbSnapshot {
        ScbSnapshot {
            handle,
            state: self.state,
            transport: self.transport,
            role: self.role,
            local: self.local,
            remote: self.remote,
            blocking: self.blocking,
            creation: self.creation,
            buffered: self.ring.len(),
            send_pending: self.sendbuf.pending().len(),
            in_flight: self.in_flight,
            peer_slot: self.peer_slot.to_option(),
            fin_received: self.fin_received,
            last_error: self.last_error,
        }
    }
}

/// Point-in-time copy of an SCB for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScbSnapshot {
    pub handle: SocketHandle,
    pub state: SocketState,
    pub transport: Transport,
    pub role: Role,
    pub local: Option<SockAddrIn>,
    pub remote: Option<SockAddrIn>,
    pub blocking: BlockingMode,
    pub creation: CreationId,
    pub buffered: usize,
    pub send_pending: usize,
    pub in_flight: u8,
    pub peer_slot: Option<SocketHandle>,
    pub fin_received: bool,
    pub last_error: Option<SockError>,
}

impl ScbSnapshot {
    #[inline]
    pub fn has_op(&self, op: OpKind) -> bool {
        self.in_flight & op.bit() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_mask() {
        let mut scb = Scb::new(Transport::Tcp, 16, 16);
        scb.set_op(OpKind::Send);
        scb.set_op(OpKind::Receive);
        assert!(scb.has_op(OpKind::Send));
        scb.clear_op(OpKind::Send);
        assert!(!scb.has_op(OpKind::Send));
        assert!(scb.has_op(OpKind::Receive));
    }

    #[test]
    fn test_reset_keeps_creation() {
        let mut scb = Scb::new(Transport::Udp, 16, 16);
        scb.state = SocketState::Connected;
        scb.creation = CreationId::new(5);
        scb.ring.push(b"data");
        scb.set_op(OpKind::Receive);
        scb.reset();

        assert_eq!(scb.state, SocketState::Closed);
        assert_eq!(scb.creation, CreationId::new(5));
        assert!(scb.ring.is_empty());
        assert_eq!(scb.in_flight, 0);
    }

    #[test]
    fn test_can_receive() {
        let mut scb = Scb::new(Transport::Tcp, 4, 4);
        assert!(!scb.can_receive());
        scb.state = SocketState::Connected;
        assert!(scb.can_receive());
        scb.ring.push(b"full");
        assert!(!scb.can_receive());

        let mut udp = Scb::new(Transport::Udp, 4, 4);
        udp.state = SocketState::Bound;
        assert!(!udp.can_receive());
        udp.local = Some(SockAddrIn::localhost(9000));
        assert!(udp.can_receive());
    }

    #[test]
    fn test_fatal_error_carries_errno() {
        let mut scb = Scb::new(Transport::Tcp, 4, 4);
        scb.fatal_errno = Some(Errno::ECONNRESET);
        let err = scb.fatal_error();
        assert_eq!(err.kind(), coopsock_core::ErrorKind::State);
        assert_eq!(err.errno(), Errno::ECONNRESET);
    }
}
