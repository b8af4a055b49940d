//! Completion entry types.
//!
//! These are the messages the transport engine posts back to the socket
//! layer. They are the *lingua franca* between the engine, the completion
//! queue and the callback bridge.

use core::fmt;

use crate::addr::SockAddrIn;
use crate::id::{CreationId, SocketHandle};

/// Correlation ID: one incarnation of one socket slot.
///
/// Every primitive issued to the engine carries the slot's handle and its
/// creation id. The engine echoes both back in the completion, which lets
/// the bridge drop completions that belong to a slot's previous life.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrId {
    pub handle: SocketHandle,
    pub creation: CreationId,
}

impl CorrId {
    #[inline]
    pub const fn new(handle: SocketHandle, creation: CreationId) -> Self {
        Self { handle, creation }
    }

    /// Slot index of the socket
    #[inline]
    pub const fn slot(&self) -> usize {
        self.handle.index()
    }
}

impl fmt::Debug for CorrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrId({}{})", self.handle, self.creation)
    }
}

/// Asynchronous operation categories
///
/// A socket has at most one operation of each category outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpKind {
    Connect = 0,
    Accept = 1,
    Send = 2,
    Receive = 3,
    Close = 4,
    Cancel = 5,
}

impl OpKind {
    pub const ALL: [OpKind; 6] = [
        OpKind::Connect,
        OpKind::Accept,
        OpKind::Send,
        OpKind::Receive,
        OpKind::Close,
        OpKind::Cancel,
    ];

    /// Bit of this category in a socket's in-flight mask
    #[inline]
    pub const fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

/// Data carried by a completion
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    /// Nothing beyond the result code
    #[default]
    None,

    /// Received bytes; `from` is set for datagrams
    Data {
        bytes: Vec<u8>,
        from: Option<SockAddrIn>,
    },

    /// Remote endpoint of a connection that was just established
    Peer(SockAddrIn),
}

/// A completed engine operation
///
/// `result` follows the engine convention: non-negative is bytes
/// transferred (or plain success), negative is `-errno`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub corr: CorrId,
    pub op: OpKind,
    pub result: i64,
    pub payload: Payload,
}

impl Completion {
    /// Success with no payload
    pub fn ok(corr: CorrId, op: OpKind, result: i64) -> Self {
        Self {
            corr,
            op,
            result,
            payload: Payload::None,
        }
    }

    /// Failure encoded as `-errno`
    pub fn failed(corr: CorrId, op: OpKind, err: crate::error::EngineError) -> Self {
        Self::ok(corr, op, err.as_result())
    }

    /// Receive completion carrying bytes
    pub fn data(corr: CorrId, bytes: Vec<u8>, from: Option<SockAddrIn>) -> Self {
        Self {
            corr,
            op: OpKind::Receive,
            result: bytes.len() as i64,
            payload: Payload::Data { bytes, from },
        }
    }

    /// Connect/accept completion naming the remote endpoint
    pub fn established(corr: CorrId, op: OpKind, peer: SockAddrIn) -> Self {
        Self {
            corr,
            op,
            result: 0,
            payload: Payload::Peer(peer),
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.result < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn corr() -> CorrId {
        CorrId::new(SocketHandle::new(3), CreationId::new(9))
    }

    #[test]
    fn test_op_bits_distinct() {
        let mut mask = 0u8;
        for op in OpKind::ALL {
            assert_eq!(mask & op.bit(), 0);
            mask |= op.bit();
        }
        assert_eq!(mask.count_ones(), 6);
    }

    #[test]
    fn test_data_completion_length() {
        let c = Completion::data(corr(), vec![1, 2, 3], None);
        assert_eq!(c.result, 3);
        assert_eq!(c.op, OpKind::Receive);
        assert!(!c.is_error());
    }

    #[test]
    fn test_failed_completion() {
        let c = Completion::failed(corr(), OpKind::Send, EngineError::Reset);
        assert!(c.is_error());
        assert_eq!(EngineError::from_result(c.result), Some(EngineError::Reset));
        assert_eq!(c.corr.slot(), 3);
    }
}
