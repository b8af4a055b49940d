//! Duplicate-socket acceptor
//!
//! A listener always tries to keep one pending duplicate: a second TCP
//! slot on the same local endpoint, in `Connecting`, with the engine's
//! accept primitive outstanding against it. When the engine hands it an
//! inbound connection the bridge moves it to `Connected`; `accept()` then
//! detaches it into an ordinary socket and reserves the next duplicate.
//!
//! If the table is full when re-arming, the listener stays `Listening`
//! without a duplicate and `ENFILE` is recorded on it. The next
//! `accept()` sees the missing duplicate and retries the reservation.

use coopsock_core::{
    kdebug, kwarn, Errno, OpKind, SockAddrIn, SockError, SockResult, SocketHandle, SocketState,
    Transport, TransportEngine,
};

use crate::layer::{Inner, SocketLayer};
use crate::scb::Role;
use crate::stats::bump;

impl<E: TransportEngine> SocketLayer<E> {
    /// Reserve a pending duplicate for `listener` and issue accept on it
    pub(crate) fn reserve_duplicate(
        &self,
        inner: &mut Inner,
        listener: SocketHandle,
    ) -> SockResult<SocketHandle> {
        let local = inner
            .table
            .live(listener)?
            .local
            .ok_or(SockError::state(Errno::EINVAL))?;

        let dup = inner
            .table
            .allocate(Transport::Tcp)
            .ok_or(SockError::resource(Errno::ENFILE))?;
        let corr = {
            let scb = inner.table.live_mut(dup)?;
            scb.role = Role::Duplicate;
            scb.local = Some(local);
            scb.state = SocketState::Connecting;
            scb.peer_slot = listener;
            scb.corr(dup)
        };
        inner.table.live_mut(listener)?.peer_slot = dup;

        let issued = self.engine.accept(corr, local);
        if let Err(e) = self.settle(inner, dup, OpKind::Accept, issued) {
            inner.table.release(dup);
            if let Ok(l) = inner.table.live_mut(listener) {
                l.peer_slot = SocketHandle::NONE;
            }
            return Err(e.into());
        }

        bump(&self.stats.duplicates, 1);
        kdebug!("listener {} reserved duplicate {} ({})", listener, dup, corr.creation);
        Ok(dup)
    }

    /// One accept attempt. `None` means no connection is ready yet.
    pub(crate) fn try_accept(
        &self,
        inner: &mut Inner,
        listener: SocketHandle,
    ) -> Option<SockResult<(SocketHandle, SockAddrIn)>> {
        let peer = inner.table.get(listener)?.peer_slot;

        if peer == SocketHandle::NONE {
            // An earlier re-arm failed; retry now that slots may be free
            return match self.reserve_duplicate(inner, listener) {
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            };
        }

        let state = inner.table.get(peer)?.state;
        match state {
            SocketState::Connected | SocketState::Closing => {
                Some(Ok(self.promote(inner, listener, peer)))
            }
            SocketState::FatalError => {
                kwarn!("listener {} dropping failed duplicate {}", listener, peer);
                self.discard_duplicate(inner, listener, peer);
                match self.reserve_duplicate(inner, listener) {
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            }
            _ => None,
        }
    }

    /// Detach the ready duplicate and re-arm the listener
    fn promote(
        &self,
        inner: &mut Inner,
        listener: SocketHandle,
        dup: SocketHandle,
    ) -> (SocketHandle, SockAddrIn) {
        let remote = match inner.table.get_mut(dup) {
            Some(scb) => {
                scb.role = Role::Plain;
                scb.peer_slot = SocketHandle::NONE;
                scb.remote.unwrap_or_default()
            }
            None => SockAddrIn::UNSPECIFIED,
        };
        if let Some(l) = inner.table.get_mut(listener) {
            l.peer_slot = SocketHandle::NONE;
            l.accept_seen = false;
        }

        if let Err(e) = self.reserve_duplicate(inner, listener) {
            kwarn!("listener {} re-arm failed: {}", listener, e);
            bump(&self.stats.rearm_failures, 1);
            if let Some(l) = inner.table.get_mut(listener) {
                l.last_error = Some(e);
            }
        }
        (dup, remote)
    }

    fn discard_duplicate(&self, inner: &mut Inner, listener: SocketHandle, dup: SocketHandle) {
        if let Some(scb) = inner.table.get(dup) {
            let corr = scb.corr(dup);
            if let Err(e) = self.engine.close(corr, Transport::Tcp) {
                kdebug!("duplicate {} engine close: {}", dup, e);
            }
        }
        inner.table.release(dup);
        if let Some(l) = inner.table.get_mut(listener) {
            l.peer_slot = SocketHandle::NONE;
        }
    }
}
