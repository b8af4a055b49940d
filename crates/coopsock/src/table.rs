//! Socket table
//!
//! Fixed arena of SCBs split into a TCP region followed by a UDP region.
//! A handle is the slot index. The table is only ever touched with the
//! layer's table lock held.

use std::ops::Range;

use coopsock_core::{CreationId, SockError, SockResult, SocketHandle, SocketState, Transport};

use crate::config::LayerConfig;
use crate::scb::Scb;

pub struct SocketTable {
    slots: Vec<Scb>,
    tcp_slots: usize,
    /// Last creation id handed out; never reset while the layer lives
    last_creation: CreationId,
}

impl SocketTable {
    pub fn new(config: &LayerConfig) -> Self {
        let mut slots = Vec::with_capacity(config.total_slots());
        for i in 0..config.total_slots() {
            let transport = if i < config.tcp_slots {
                Transport::Tcp
            } else {
                Transport::Udp
            };
            slots.push(Scb::new(transport, config.recv_capacity, config.send_capacity));
        }
        Self {
            slots,
            tcp_slots: config.tcp_slots,
            last_creation: CreationId::UNSET,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot indices of a transport's region
    pub fn region(&self, transport: Transport) -> Range<usize> {
        match transport {
            Transport::Tcp => 0..self.tcp_slots,
            Transport::Udp => self.tcp_slots..self.slots.len(),
        }
    }

    /// Take the lowest free slot of the region and give it a new creation id
    pub fn allocate(&mut self, transport: Transport) -> Option<SocketHandle> {
        let index = self
            .region(transport)
            .find(|&i| self.slots[i].state == SocketState::Closed)?;

        self.last_creation = self.last_creation.next();
        let scb = &mut self.slots[index];
        scb.reset();
        scb.creation = self.last_creation;
        scb.state = SocketState::Created;
        Some(SocketHandle::new(index as u32))
    }

    /// Return a slot to `Closed`
    pub fn release(&mut self, handle: SocketHandle) {
        if let Some(scb) = self.slots.get_mut(handle.index()) {
            scb.reset();
        }
    }

    /// Any slot, allocated or not
    #[inline]
    pub fn get(&self, handle: SocketHandle) -> Option<&Scb> {
        self.slots.get(handle.index())
    }

    #[inline]
    pub fn get_mut(&mut self, handle: SocketHandle) -> Option<&mut Scb> {
        self.slots.get_mut(handle.index())
    }

    /// An allocated slot, or "not a socket"
    pub fn live(&self, handle: SocketHandle) -> SockResult<&Scb> {
        match self.slots.get(handle.index()) {
            Some(scb) if scb.state.is_allocated() => Ok(scb),
            _ => Err(SockError::bad_handle()),
        }
    }

    pub fn live_mut(&mut self, handle: SocketHandle) -> SockResult<&mut Scb> {
        match self.slots.get_mut(handle.index()) {
            Some(scb) if scb.state.is_allocated() => Ok(scb),
            _ => Err(SockError::bad_handle()),
        }
    }

    /// An active socket of `transport` has `port` as its local port
    pub fn port_in_use(&self, transport: Transport, port: u16) -> bool {
        self.slots[self.region(transport)]
            .iter()
            .any(|scb| scb.state.is_allocated() && scb.local.is_some_and(|l| l.port == port))
    }

    /// Handles of every allocated slot
    pub fn allocated(&self) -> impl Iterator<Item = SocketHandle> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, scb)| scb.state.is_allocated())
            .map(|(i, _)| SocketHandle::new(i as u32))
    }

    /// Most recent creation id
    pub fn last_creation(&self) -> CreationId {
        self.last_creation
    }
}
