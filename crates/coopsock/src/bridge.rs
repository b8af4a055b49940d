//! Callback bridge
//!
//! Applies engine completions to socket control blocks. Runs only with
//! the table lock held, either from an API call or from a waiter inside
//! the blocking adapter, so completions for one socket are applied in
//! the order the engine posted them.
//!
//! A completion whose creation id differs from the slot's current one
//! belongs to a previous incarnation of the slot and is dropped.

use coopsock_core::{
    kdebug, kerror, ktrace, kwarn, Completion, EngineError, EngineResult, Issued, OpKind,
    Payload, SockError, SocketHandle, SocketState, Transport, TransportEngine,
};

use crate::layer::{Inner, SocketLayer};
use crate::stats::bump;

impl<E: TransportEngine> SocketLayer<E> {
    /// Apply every inline and queued completion
    pub(crate) fn drain(&self, inner: &mut Inner) {
        loop {
            let next = match inner.inline.pop_front() {
                Some(c) => c,
                None => match self.queue.pop() {
                    Some(c) => c,
                    None => break,
                },
            };
            self.apply(inner, next);
        }
    }

    /// Record the outcome of issuing `op`.
    ///
    /// Pending and inline-complete operations set the in-flight bit; an
    /// inline completion is queued for the next drain. A synchronous
    /// rejection leaves the socket untouched.
    pub(crate) fn settle(
        &self,
        inner: &mut Inner,
        h: SocketHandle,
        op: OpKind,
        issued: EngineResult<Issued>,
    ) -> EngineResult<()> {
        let issued = issued?;
        if let Some(scb) = inner.table.get_mut(h) {
            scb.set_op(op);
        }
        if let Issued::Complete(c) = issued {
            inner.inline.push_back(c);
        }
        Ok(())
    }

    /// Ask for more data if the socket can take it
    pub(crate) fn issue_receive(&self, inner: &mut Inner, h: SocketHandle) {
        let Some(scb) = inner.table.get(h) else {
            return;
        };
        if !scb.can_receive() {
            return;
        }
        let corr = scb.corr(h);
        let transport = scb.transport;
        let max_len = scb.receive_len();

        let issued = self.engine.receive(corr, transport, max_len);
        if let Err(e) = self.settle(inner, h, OpKind::Receive, issued) {
            inner.inline.push_back(Completion::failed(corr, OpKind::Receive, e));
        }
    }

    /// Hand the unconfirmed part of the send buffer to the engine
    pub(crate) fn issue_send(&self, inner: &mut Inner, h: SocketHandle) -> EngineResult<()> {
        let Some(scb) = inner.table.get(h) else {
            return Err(EngineError::Invalid);
        };
        let corr = scb.corr(h);
        let issued = self
            .engine
            .send(corr, scb.transport, scb.sendbuf.pending(), scb.send_to);
        self.settle(inner, h, OpKind::Send, issued)
    }

    fn apply(&self, inner: &mut Inner, c: Completion) {
        bump(&self.stats.completions, 1);
        let h = c.corr.handle;

        let Some(scb) = inner.table.get_mut(h) else {
            bump(&self.stats.stale_completions, 1);
            kwarn!("completion for unknown slot {:?}", c.corr);
            return;
        };
        if !scb.state.is_allocated() || scb.creation != c.corr.creation {
            bump(&self.stats.stale_completions, 1);
            kwarn!(
                "dropping stale {:?} completion for {:?} (slot now {})",
                c.op,
                c.corr,
                scb.creation
            );
            return;
        }
        ktrace!("socket {} {:?} -> {}", h, c.op, c.result);
        scb.clear_op(c.op);

        if let Some(err) = EngineError::from_result(c.result) {
            if c.op == OpKind::Send {
                scb.sendbuf.reset();
                scb.send_to = None;
            }
            if err == EngineError::Cancelled {
                scb.last_error = Some(SockError::cancelled());
                return;
            }
            kerror!("socket {} {:?} failed: {}", h, c.op, err);
            scb.state = SocketState::FatalError;
            scb.fatal_errno = Some(err.errno());
            scb.last_error = Some(SockError::transport(err.errno()));
            return;
        }

        match c.op {
            OpKind::Connect | OpKind::Accept => self.on_established(inner, h, c),
            OpKind::Send => self.on_sent(inner, h, c.result as usize),
            OpKind::Receive => self.on_received(inner, h, c.payload),
            OpKind::Close | OpKind::Cancel => {}
        }
    }

    fn on_established(&self, inner: &mut Inner, h: SocketHandle, c: Completion) {
        let Some(scb) = inner.table.get_mut(h) else {
            return;
        };
        if let Payload::Peer(peer) = c.payload {
            scb.remote = Some(peer);
        }
        if scb.state == SocketState::Connecting {
            scb.state = SocketState::Connected;
            scb.connect_event = c.op == OpKind::Connect;
            kdebug!("socket {} connected to {:?}", h, scb.remote);
        }
        self.issue_receive(inner, h);
    }

    fn on_sent(&self, inner: &mut Inner, h: SocketHandle, n: usize) {
        let Some(scb) = inner.table.get_mut(h) else {
            return;
        };
        bump(&self.stats.bytes_sent, n as u64);

        if scb.sendbuf.confirm(n) || scb.close_pending {
            scb.sendbuf.reset();
            scb.send_to = None;
            return;
        }

        // Partial transfer: push the remainder
        ktrace!(
            "socket {} sent {}/{}, re-issuing",
            h,
            scb.sendbuf.confirmed(),
            scb.sendbuf.submitted()
        );
        if let Err(e) = self.issue_send(inner, h) {
            let corr = match inner.table.get(h) {
                Some(scb) => scb.corr(h),
                None => return,
            };
            inner.inline.push_back(Completion::failed(corr, OpKind::Send, e));
        }
    }

    fn on_received(&self, inner: &mut Inner, h: SocketHandle, payload: Payload) {
        let Some(scb) = inner.table.get_mut(h) else {
            return;
        };
        let (bytes, from) = match payload {
            Payload::Data { bytes, from } => (bytes, from),
            _ => (Vec::new(), None),
        };

        if bytes.is_empty() && scb.transport == Transport::Tcp {
            // Peer closed its write side; keep what is buffered
            scb.fin_received = true;
            if scb.state == SocketState::Connected {
                scb.state = SocketState::Closing;
            }
            kdebug!("socket {} peer closed, {} bytes buffered", h, scb.ring.len());
            return;
        }

        let taken = scb.ring.push(&bytes);
        if taken < bytes.len() {
            bump(&self.stats.bytes_dropped, (bytes.len() - taken) as u64);
            kwarn!(
                "socket {} ring full, dropped {} bytes",
                h,
                bytes.len() - taken
            );
        }
        if scb.transport == Transport::Udp && from.is_some() {
            scb.udp_from = from;
        }
        bump(&self.stats.bytes_received, taken as u64);

        self.issue_receive(inner, h);
    }
}
