//! Level-triggered multiplexer
//!
//! `select` evaluates readiness over three handle sets and rewrites each
//! set in place to its ready members. Evaluation does not change socket
//! state except for two one-shot flags: a listener's ready duplicate and a
//! completed connect are each reported once.
//!
//! The timeout is counted in `TickSource` ticks. `Some(0)` polls once,
//! `None` waits until something is ready.

use core::fmt;

use coopsock_core::bsd::FD_SETSIZE;
use coopsock_core::{
    CreationId, ErrorKind, OpKind, SockError, SockResult, SocketHandle, SocketState, Transport,
    TransportEngine,
};

use crate::layer::{Inner, SocketLayer};
use crate::scb::{Role, Scb};
use crate::stats::bump;

const WORDS: usize = FD_SETSIZE / 64;

/// Fixed-size handle set, like `fd_set`
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct FdSet {
    bits: [u64; WORDS],
}

impl FdSet {
    pub const fn new() -> Self {
        Self { bits: [0; WORDS] }
    }

    /// `FD_SET`; returns `false` if the handle does not fit
    pub fn insert(&mut self, h: SocketHandle) -> bool {
        let i = h.index();
        if i >= FD_SETSIZE {
            return false;
        }
        self.bits[i / 64] |= 1 << (i % 64);
        true
    }

    /// `FD_CLR`
    pub fn remove(&mut self, h: SocketHandle) {
        let i = h.index();
        if i < FD_SETSIZE {
            self.bits[i / 64] &= !(1 << (i % 64));
        }
    }

    /// `FD_ISSET`
    pub fn contains(&self, h: SocketHandle) -> bool {
        let i = h.index();
        i < FD_SETSIZE && self.bits[i / 64] & (1 << (i % 64)) != 0
    }

    /// `FD_ZERO`
    pub fn clear(&mut self) {
        self.bits = [0; WORDS];
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Members in ascending order
    pub fn iter(&self) -> impl Iterator<Item = SocketHandle> + '_ {
        (0..FD_SETSIZE)
            .filter(move |&i| self.bits[i / 64] & (1 << (i % 64)) != 0)
            .map(|i| SocketHandle::new(i as u32))
    }

    /// Highest member plus one, like `nfds`
    fn span(&self) -> usize {
        self.iter().last().map_or(0, |h| h.index() + 1)
    }
}

impl FromIterator<SocketHandle> for FdSet {
    fn from_iter<I: IntoIterator<Item = SocketHandle>>(iter: I) -> Self {
        let mut set = FdSet::new();
        for h in iter {
            set.insert(h);
        }
        set
    }
}

impl fmt::Debug for FdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|h| h.as_u32())).finish()
    }
}

fn readable(inner: &Inner, scb: &Scb) -> bool {
    if !scb.ring.is_empty() {
        return true;
    }
    if scb.transport == Transport::Tcp && scb.fin_received {
        return true;
    }
    if scb.role == Role::Listener && !scb.accept_seen && !scb.peer_slot.is_none() {
        if let Some(dup) = inner.table.get(scb.peer_slot) {
            return dup.state.is_established();
        }
    }
    false
}

fn writable(scb: &Scb) -> bool {
    if scb.transport == Transport::Tcp && scb.connect_event {
        return true;
    }
    let open = match scb.transport {
        Transport::Tcp => scb.state == SocketState::Connected,
        Transport::Udp => {
            scb.local.is_some() && matches!(scb.state, SocketState::Bound | SocketState::Connected)
        }
    };
    open && !scb.has_op(OpKind::Send)
}

/// A slot closed after use counts as an error. One that was never opened
/// has no creation id and is never reported.
fn errored(scb: &Scb) -> bool {
    let closed_after_use = !scb.state.is_allocated() && scb.creation != CreationId::UNSET;
    scb.state.is_fatal()
        || closed_after_use
        || scb.last_error.is_some_and(|e| e.kind() == ErrorKind::Cancelled)
}

impl<E: TransportEngine> SocketLayer<E> {
    /// Wait until a member of any set is ready.
    ///
    /// Returns the number of ready memberships; each set is rewritten to
    /// its ready members. Zero means the timeout expired.
    pub fn select(
        &self,
        read: Option<&mut FdSet>,
        write: Option<&mut FdSet>,
        error: Option<&mut FdSet>,
        timeout_ticks: Option<u64>,
    ) -> SockResult<usize> {
        let result = self
            .check_open()
            .and_then(|_| self.do_select(read, write, error, timeout_ticks));
        self.track(None, result)
    }

    fn do_select(
        &self,
        mut read: Option<&mut FdSet>,
        mut write: Option<&mut FdSet>,
        mut error: Option<&mut FdSet>,
        timeout_ticks: Option<u64>,
    ) -> SockResult<usize> {
        let capacity = self.capacity();
        for set in [read.as_deref(), write.as_deref(), error.as_deref()]
            .into_iter()
            .flatten()
        {
            if set.span() > capacity {
                return Err(SockError::bad_handle());
            }
        }

        let mut remaining = timeout_ticks;
        let mut last_tick = self.clock.now_ticks();

        loop {
            let seen = self.queue.epoch();
            {
                let mut inner = self.enter();
                let r = eval(&inner, read.as_deref(), readable);
                let w = eval(&inner, write.as_deref(), |_, scb| writable(scb));
                let e = eval(&inner, error.as_deref(), |_, scb| errored(scb));
                let count = r.len() + w.len() + e.len();

                if count > 0 || remaining == Some(0) {
                    // Consume the one-shot events being reported
                    for h in r.iter() {
                        if let Some(scb) = inner.table.get_mut(h) {
                            if scb.role == Role::Listener && scb.ring.is_empty() {
                                scb.accept_seen = true;
                            }
                        }
                    }
                    for h in w.iter() {
                        if let Some(scb) = inner.table.get_mut(h) {
                            scb.connect_event = false;
                        }
                    }
                    drop(inner);

                    store(&mut read, r);
                    store(&mut write, w);
                    store(&mut error, e);
                    return Ok(count);
                }
            }

            bump(&self.stats.parks, 1);
            self.queue.park(seen, self.config.park_interval);

            if let Some(left) = remaining.as_mut() {
                let now = self.clock.now_ticks();
                if now != last_tick {
                    *left = left.saturating_sub(now.wrapping_sub(last_tick));
                    last_tick = now;
                }
            }
        }
    }
}

/// Members of `set` for which `pred` holds
fn eval(inner: &Inner, set: Option<&FdSet>, pred: impl Fn(&Inner, &Scb) -> bool) -> FdSet {
    let mut ready = FdSet::new();
    if let Some(set) = set {
        for h in set.iter() {
            if let Some(scb) = inner.table.get(h) {
                if pred(inner, scb) {
                    ready.insert(h);
                }
            }
        }
    }
    ready
}

fn store(target: &mut Option<&mut FdSet>, ready: FdSet) {
    if let Some(set) = target.as_deref_mut() {
        *set = ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fdset_ops() {
        let mut set = FdSet::new();
        assert!(set.is_empty());
        assert!(set.insert(SocketHandle::new(3)));
        assert!(set.insert(SocketHandle::new(70)));
        assert!(!set.insert(SocketHandle::new(FD_SETSIZE as u32)));

        assert!(set.contains(SocketHandle::new(70)));
        assert_eq!(set.len(), 2);
        assert_eq!(set.span(), 71);

        set.remove(SocketHandle::new(70));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![SocketHandle::new(3)]);
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_fdset_from_iter() {
        let set: FdSet = [1u32, 5, 1].into_iter().map(SocketHandle::new).collect();
        assert_eq!(set.len(), 2);
        assert_eq!(format!("{:?}", set), "{1, 5}");
    }
}
