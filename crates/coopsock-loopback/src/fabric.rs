//! Loopback transport engine
//!
//! Endpoints live in a single in-memory fabric keyed by socket slot. A TCP
//! connect pairs the caller with whichever endpoint has an accept
//! outstanding on a matching local address; after that, bytes written on
//! one side land in the other side's stream. A connect to a bound port
//! with no accept outstanding waits in a SYN queue for the next one; a
//! connect to an unbound port is refused. UDP datagrams go to the bound
//! endpoint whose local address accepts the destination, or are dropped.
//!
//! Send, close and cancel complete inline, as does a connect that can be
//! resolved at once. Everything else completes through the sink. If the sink is full, completions wait in a backlog that `poll()`
//! flushes, so per-socket order is kept.

use std::collections::{BTreeMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::Arc;

use coopsock_core::{
    kdebug, ktrace, Completion, CompletionSink, CorrId, EngineError, EngineResult, Errno, Issued,
    OpKind, SockAddrIn, SocketHandle, SpinLock, Transport, TransportEngine,
};

/// The address peers see for `a`: the wildcard reads as loopback
fn visible(a: SockAddrIn) -> SockAddrIn {
    if a.is_any() {
        SockAddrIn::new(Ipv4Addr::LOCALHOST, a.port)
    } else {
        a
    }
}

#[derive(Debug)]
struct Endpoint {
    corr: CorrId,
    transport: Transport,
    local: Option<SockAddrIn>,
    /// Registered through `open` and owns its port
    bound: bool,
    remote: Option<SockAddrIn>,
    /// Other end of a TCP connection
    peer: Option<CorrId>,
    stream: VecDeque<u8>,
    datagrams: VecDeque<(Vec<u8>, SockAddrIn)>,
    /// Outstanding receive and its size limit
    recv_wanted: Option<usize>,
    accepting: bool,
    fin: bool,
    reset: bool,
}

impl Endpoint {
    fn new(corr: CorrId, transport: Transport) -> Self {
        Self {
            corr,
            transport,
            local: None,
            bound: false,
            remote: None,
            peer: None,
            stream: VecDeque::new(),
            datagrams: VecDeque::new(),
            recv_wanted: None,
            accepting: false,
            fin: false,
            reset: false,
        }
    }

    /// Completion for a receive of up to `max_len` bytes, if one can be
    /// produced now
    fn take_ready(&mut self, max_len: usize) -> Option<Completion> {
        if self.reset {
            return Some(Completion::failed(self.corr, OpKind::Receive, EngineError::Reset));
        }
        match self.transport {
            Transport::Tcp => {
                if !self.stream.is_empty() {
                    let n = max_len.min(self.stream.len());
                    let bytes: Vec<u8> = self.stream.drain(..n).collect();
                    Some(Completion::data(self.corr, bytes, None))
                } else if self.fin {
                    Some(Completion::data(self.corr, Vec::new(), None))
                } else {
                    None
                }
            }
            Transport::Udp => self.datagrams.pop_front().map(|(mut bytes, from)| {
                bytes.truncate(max_len);
                Completion::data(self.corr, bytes, Some(from))
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HeldConnect {
    corr: CorrId,
    local: SockAddrIn,
    remote: SockAddrIn,
}

struct HeldSend {
    corr: CorrId,
    transport: Transport,
    data: Vec<u8>,
    to: Option<SockAddrIn>,
}

struct Fabric {
    sink: Arc<dyn CompletionSink>,
    endpoints: BTreeMap<usize, Endpoint>,
    /// Handshakes parked by `hold_connects`
    held: Vec<HeldConnect>,
    /// Handshakes waiting for an accept on a bound port
    syn_queue: VecDeque<HeldConnect>,
    hold: bool,
    /// Sends parked by `hold_sends`
    held_sends: Vec<HeldSend>,
    hold_sends: bool,
    max_segment: Option<usize>,
    backlog: VecDeque<Completion>,
}

impl Fabric {
    /// Endpoint for `corr`, created fresh if the slot is new or recycled
    fn endpoint(&mut self, corr: CorrId, transport: Transport) -> &mut Endpoint {
        let ep = self
            .endpoints
            .entry(corr.slot())
            .or_insert_with(|| Endpoint::new(corr, transport));
        if ep.corr != corr {
            ktrace!("loopback: slot {} recycled as {:?}", corr.slot(), corr);
            *ep = Endpoint::new(corr, transport);
        }
        ep
    }

    /// Endpoint for `corr` only if it is still that incarnation
    fn live(&mut self, corr: CorrId) -> Option<&mut Endpoint> {
        self.endpoints
            .get_mut(&corr.slot())
            .filter(|ep| ep.corr == corr)
    }

    fn post(&mut self, c: Completion) {
        if !self.backlog.is_empty() {
            self.backlog.push_back(c);
            return;
        }
        if let Err(c) = self.sink.push(c) {
            kdebug!("loopback: sink full, backlogging {:?}", c.corr);
            self.backlog.push_back(c);
        }
    }

    fn flush(&mut self) {
        while let Some(c) = self.backlog.pop_front() {
            if let Err(c) = self.sink.push(c) {
                self.backlog.push_front(c);
                break;
            }
        }
    }

    /// Complete the outstanding receive on `slot` if data (or EOF) is there
    fn fulfil(&mut self, slot: usize) {
        let Some(ep) = self.endpoints.get_mut(&slot) else {
            return;
        };
        let Some(max_len) = ep.recv_wanted else {
            return;
        };
        if let Some(c) = ep.take_ready(max_len) {
            ep.recv_wanted = None;
            self.post(c);
        }
    }

    fn acceptor_for(&self, remote: &SockAddrIn) -> Option<usize> {
        self.endpoints
            .iter()
            .find(|(_, ep)| {
                ep.transport == Transport::Tcp
                    && ep.accepting
                    && ep.local.is_some_and(|l| l.accepts(remote))
            })
            .map(|(&slot, _)| slot)
    }

    fn listening_on(&self, remote: &SockAddrIn) -> bool {
        self.endpoints.values().any(|ep| {
            ep.transport == Transport::Tcp && ep.bound && ep.local.is_some_and(|l| l.accepts(remote))
        })
    }

    /// Resolve a handshake: pair it, refuse it, or queue it. `None` means
    /// it was queued.
    fn handshake(&mut self, h: HeldConnect) -> Option<Completion> {
        if let Some(slot) = self.acceptor_for(&h.remote) {
            return Some(self.establish(slot, h));
        }
        if self.listening_on(&h.remote) {
            ktrace!("loopback: {:?} -> {} queued", h.corr, h.remote);
            self.syn_queue.push_back(h);
            return None;
        }
        kdebug!("loopback: {:?} -> {} refused", h.corr, h.remote);
        Some(Completion::failed(h.corr, OpKind::Connect, EngineError::Refused))
    }

    /// Move one send's bytes to its destination
    fn deliver(
        &mut self,
        corr: CorrId,
        transport: Transport,
        data: &[u8],
        to: Option<SockAddrIn>,
    ) -> EngineResult<Completion> {
        let (reset, peer, local, remote) = match self.live(corr) {
            Some(ep) => (ep.reset, ep.peer, ep.local, ep.remote),
            None => return Err(EngineError::Invalid),
        };
        if reset {
            return Ok(Completion::failed(corr, OpKind::Send, EngineError::Reset));
        }

        let n = match transport {
            Transport::Tcp => {
                let peer = peer.ok_or(EngineError::Other(Errno::ENOTCONN as i32))?;
                let n = self.max_segment.map_or(data.len(), |m| m.min(data.len()));
                match self.live(peer) {
                    Some(dst) => dst.stream.extend(&data[..n]),
                    None => {
                        return Ok(Completion::failed(corr, OpKind::Send, EngineError::Reset))
                    }
                }
                self.fulfil(peer.slot());
                n
            }
            Transport::Udp => {
                let dest = to.or(remote).ok_or(EngineError::Invalid)?;
                let from = visible(local.unwrap_or_default());
                let target = self
                    .endpoints
                    .iter()
                    .find(|(_, ep)| {
                        ep.transport == Transport::Udp
                            && ep.bound
                            && ep.local.is_some_and(|l| l.accepts(&dest))
                    })
                    .map(|(&slot, _)| slot);
                match target {
                    Some(slot) => {
                        if let Some(dst) = self.endpoints.get_mut(&slot) {
                            dst.datagrams.push_back((data.to_vec(), from));
                        }
                        self.fulfil(slot);
                    }
                    None => ktrace!("loopback: datagram for {} dropped", dest),
                }
                data.len()
            }
        };
        Ok(Completion::ok(corr, OpKind::Send, n as i64))
    }

    /// Pair a connecting endpoint with the acceptor on `slot`.
    ///
    /// Posts the acceptor's completion and returns the connector's.
    fn establish(&mut self, slot: usize, h: HeldConnect) -> Completion {
        let HeldConnect { corr, local, remote } = h;
        let client_addr = visible(local);

        let server_corr = match self.endpoints.get_mut(&slot) {
            Some(server) => {
                server.accepting = false;
                server.peer = Some(corr);
                server.remote = Some(client_addr);
                server.corr
            }
            None => return Completion::failed(corr, OpKind::Connect, EngineError::Refused),
        };

        let client = self.endpoint(corr, Transport::Tcp);
        client.local = Some(local);
        client.remote = Some(remote);
        client.peer = Some(server_corr);

        kdebug!("loopback: {:?} {} <-> {:?} {}", corr, client_addr, server_corr, remote);
        self.post(Completion::established(server_corr, OpKind::Accept, client_addr));
        Completion::established(corr, OpKind::Connect, remote)
    }
}

/// In-memory TCP/UDP engine
pub struct LoopbackEngine {
    fabric: SpinLock<Fabric>,
}

impl LoopbackEngine {
    pub fn new(sink: Arc<dyn CompletionSink>) -> Self {
        Self {
            fabric: SpinLock::new(Fabric {
                sink,
                endpoints: BTreeMap::new(),
                held: Vec::new(),
                syn_queue: VecDeque::new(),
                hold: false,
                held_sends: Vec::new(),
                hold_sends: false,
                max_segment: None,
                backlog: VecDeque::new(),
            }),
        }
    }

    /// Park TCP handshakes until `release_connects`
    pub fn hold_connects(&self) {
        self.fabric.lock().hold = true;
    }

    /// Resolve every held handshake and stop holding. Returns how many
    /// were released.
    pub fn release_connects(&self) -> usize {
        let mut fabric = self.fabric.lock();
        fabric.hold = false;
        let held = std::mem::take(&mut fabric.held);
        for &h in &held {
            if let Some(c) = fabric.handshake(h) {
                fabric.post(c);
            }
        }
        fabric.sink.notify();
        held.len()
    }

    /// Leave every send outstanding until `release_sends`
    pub fn hold_sends(&self) {
        self.fabric.lock().hold_sends = true;
    }

    /// Deliver every held send and stop holding. Returns how many were
    /// released.
    pub fn release_sends(&self) -> usize {
        let mut fabric = self.fabric.lock();
        fabric.hold_sends = false;
        let held = std::mem::take(&mut fabric.held_sends);
        for s in &held {
            let c = fabric
                .deliver(s.corr, s.transport, &s.data, s.to)
                .unwrap_or_else(|e| Completion::failed(s.corr, OpKind::Send, e));
            fabric.post(c);
        }
        fabric.sink.notify();
        held.len()
    }

    /// Limit TCP sends to `max` bytes each; `None` lifts the limit
    pub fn set_max_segment(&self, max: Option<usize>) {
        self.fabric.lock().max_segment = max.map(|m| m.max(1));
    }

    /// Reset the connection of socket `h`: its outstanding receive and
    /// every later operation fail with `ECONNRESET`.
    pub fn inject_reset(&self, h: SocketHandle) -> bool {
        let mut fabric = self.fabric.lock();
        let Some(ep) = fabric.endpoints.get_mut(&h.index()) else {
            return false;
        };
        ep.reset = true;
        fabric.fulfil(h.index());
        true
    }

    /// Number of endpoints with an accept outstanding
    pub fn pending_accepts(&self) -> usize {
        self.fabric
            .lock()
            .endpoints
            .values()
            .filter(|ep| ep.accepting)
            .count()
    }

    /// Handshakes waiting for an accept
    pub fn queued_connects(&self) -> usize {
        self.fabric.lock().syn_queue.len()
    }

    pub fn endpoint_count(&self) -> usize {
        self.fabric.lock().endpoints.len()
    }

    pub fn backlog_len(&self) -> usize {
        self.fabric.lock().backlog.len()
    }
}

impl TransportEngine for LoopbackEngine {
    fn open(&self, corr: CorrId, transport: Transport, local: SockAddrIn) -> EngineResult<()> {
        let mut fabric = self.fabric.lock();
        let taken = fabric.endpoints.iter().any(|(&slot, ep)| {
            slot != corr.slot()
                && ep.bound
                && ep.transport == transport
                && ep.local.is_some_and(|l| l.port == local.port)
        });
        if taken {
            return Err(EngineError::AddrInUse);
        }
        let ep = fabric.endpoint(corr, transport);
        ep.local = Some(local);
        ep.bound = true;
        Ok(())
    }

    fn connect(
        &self,
        corr: CorrId,
        transport: Transport,
        local: SockAddrIn,
        remote: SockAddrIn,
    ) -> EngineResult<Issued> {
        let mut fabric = self.fabric.lock();
        if transport == Transport::Udp {
            let ep = fabric.endpoint(corr, transport);
            ep.local.get_or_insert(local);
            ep.remote = Some(remote);
            return Ok(Issued::Complete(Completion::established(
                corr,
                OpKind::Connect,
                remote,
            )));
        }

        fabric.endpoint(corr, transport).local = Some(local);
        let h = HeldConnect { corr, local, remote };
        if fabric.hold {
            fabric.held.push(h);
            return Ok(Issued::Pending);
        }
        Ok(match fabric.handshake(h) {
            Some(c) => Issued::Complete(c),
            None => Issued::Pending,
        })
    }

    fn accept(&self, corr: CorrId, local: SockAddrIn) -> EngineResult<Issued> {
        let mut fabric = self.fabric.lock();
        let ep = fabric.endpoint(corr, Transport::Tcp);
        ep.local = Some(local);
        ep.accepting = true;

        let queued = fabric.syn_queue.iter().position(|h| local.accepts(&h.remote));
        if let Some(h) = queued.and_then(|i| fabric.syn_queue.remove(i)) {
            let c = fabric.establish(corr.slot(), h);
            fabric.post(c);
        }
        Ok(Issued::Pending)
    }

    fn send(
        &self,
        corr: CorrId,
        transport: Transport,
        data: &[u8],
        to: Option<SockAddrIn>,
    ) -> EngineResult<Issued> {
        let mut fabric = self.fabric.lock();
        if fabric.live(corr).is_none() {
            return Err(EngineError::Invalid);
        }
        if fabric.hold_sends {
            fabric.held_sends.push(HeldSend { corr, transport, data: data.to_vec(), to });
            return Ok(Issued::Pending);
        }
        fabric.deliver(corr, transport, data, to).map(Issued::Complete)
    }

    fn receive(&self, corr: CorrId, transport: Transport, max_len: usize) -> EngineResult<Issued> {
        let mut fabric = self.fabric.lock();
        let ep = fabric.endpoint(corr, transport);
        if let Some(c) = ep.take_ready(max_len) {
            return Ok(Issued::Complete(c));
        }
        ep.recv_wanted = Some(max_len);
        Ok(Issued::Pending)
    }

    fn close(&self, corr: CorrId, _transport: Transport) -> EngineResult<Issued> {
        let mut fabric = self.fabric.lock();
        fabric.held.retain(|h| h.corr != corr);
        fabric.syn_queue.retain(|h| h.corr != corr);
        fabric.held_sends.retain(|s| s.corr != corr);

        let (peer, bound) = match fabric.live(corr) {
            Some(ep) => (ep.peer, ep.bound.then_some(ep.local).flatten()),
            None => return Ok(Issued::Complete(Completion::ok(corr, OpKind::Close, 0))),
        };
        fabric.endpoints.remove(&corr.slot());

        // Handshakes queued on a port nobody listens on any more
        if let Some(local) = bound {
            let mut refused = Vec::new();
            let mut i = 0;
            while i < fabric.syn_queue.len() {
                let remote = fabric.syn_queue[i].remote;
                if local.accepts(&remote) && !fabric.listening_on(&remote) {
                    refused.extend(fabric.syn_queue.remove(i));
                } else {
                    i += 1;
                }
            }
            for h in refused {
                fabric.post(Completion::failed(h.corr, OpKind::Connect, EngineError::Refused));
            }
        }

        if let Some(peer) = peer {
            let alive = match fabric.live(peer) {
                Some(p) => {
                    p.fin = true;
                    true
                }
                None => false,
            };
            if alive {
                fabric.fulfil(peer.slot());
            }
        }
        Ok(Issued::Complete(Completion::ok(corr, OpKind::Close, 0)))
    }

    fn cancel(&self, corr: CorrId, _transport: Transport) -> EngineResult<Issued> {
        let mut fabric = self.fabric.lock();
        let mut aborted = Vec::new();

        let before = fabric.held.len() + fabric.syn_queue.len();
        fabric.held.retain(|h| h.corr != corr);
        fabric.syn_queue.retain(|h| h.corr != corr);
        if fabric.held.len() + fabric.syn_queue.len() != before {
            aborted.push(OpKind::Connect);
        }
        let sends = fabric.held_sends.len();
        fabric.held_sends.retain(|s| s.corr != corr);
        if fabric.held_sends.len() != sends {
            aborted.push(OpKind::Send);
        }
        if let Some(ep) = fabric.live(corr) {
            if ep.recv_wanted.take().is_some() {
                aborted.push(OpKind::Receive);
            }
            if std::mem::take(&mut ep.accepting) {
                aborted.push(OpKind::Accept);
            }
        }

        for op in aborted {
            fabric.post(Completion::failed(corr, op, EngineError::Cancelled));
        }
        Ok(Issued::Complete(Completion::ok(corr, OpKind::Cancel, 0)))
    }

    fn poll(&self) {
        let mut fabric = self.fabric.lock();
        if !fabric.backlog.is_empty() {
            fabric.flush();
        }
    }
}
