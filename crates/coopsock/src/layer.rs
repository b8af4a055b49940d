//! Public socket API
//!
//! `SocketLayer` owns the socket table, the completion queue and the
//! engine. Every call follows the same shape: poll the engine, take the
//! table lock, drain completions, validate, act. Calls that can suspend go
//! through the blocking adapter.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use coopsock_core::bsd::{AF_INET, F_GETFL, F_SETFL, O_NONBLOCK};
use coopsock_core::kprint::{self, LogLevel};
use coopsock_core::spinlock::SpinLockGuard;
use coopsock_core::{
    kdebug, kinfo, kwarn, BlockingMode, Completion, CompletionSink, CreationId, EntropySource,
    Errno, OpKind, SockAddrIn, SockError, SockResult, SocketHandle, SocketState, SpinLock,
    TickSource, Transport, TransportEngine,
};

use crate::completion::CompletionQueue;
use crate::config::{ConfigError, LayerConfig};
use crate::ports::PortAllocator;
use crate::scb::{Role, ScbSnapshot};
use crate::stats::{bump, LayerStats, StatsSnapshot};
use crate::table::SocketTable;

/// State guarded by the table lock
pub(crate) struct Inner {
    pub(crate) table: SocketTable,
    pub(crate) ports: PortAllocator,
    /// Completions returned inline by engine primitives, applied before
    /// anything still in the queue
    pub(crate) inline: VecDeque<Completion>,
}

/// BSD-style sockets over a `TransportEngine`
pub struct SocketLayer<E: TransportEngine> {
    pub(crate) inner: SpinLock<Inner>,
    pub(crate) engine: E,
    pub(crate) queue: Arc<CompletionQueue>,
    pub(crate) clock: Arc<dyn TickSource>,
    pub(crate) config: LayerConfig,
    pub(crate) stats: LayerStats,
    last_errno: AtomicI32,
    shut_down: AtomicBool,
}

impl<E: TransportEngine> SocketLayer<E> {
    /// Open the layer.
    ///
    /// `build` receives the completion sink the engine must post to and
    /// returns the engine.
    pub fn open<F>(
        config: LayerConfig,
        clock: Arc<dyn TickSource>,
        entropy: Box<dyn EntropySource>,
        build: F,
    ) -> Result<Self, ConfigError>
    where
        F: FnOnce(Arc<dyn CompletionSink>) -> E,
    {
        config.validate()?;
        if config.debug_logging {
            kprint::set_log_level(LogLevel::Debug);
        }

        let queue = Arc::new(CompletionQueue::new(config.completion_queue));
        let sink: Arc<dyn CompletionSink> = queue.clone();
        let engine = build(sink);

        kinfo!(
            "layer open: {} tcp + {} udp slots, ring {}B, send {}B",
            config.tcp_slots,
            config.udp_slots,
            config.recv_capacity,
            config.send_capacity
        );

        Ok(Self {
            inner: SpinLock::new(Inner {
                table: SocketTable::new(&config),
                ports: PortAllocator::new(entropy, config.port_attempts),
                inline: VecDeque::new(),
            }),
            engine,
            queue,
            clock,
            config,
            stats: LayerStats::default(),
            last_errno: AtomicI32::new(0),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// The engine, for engine-specific controls
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Poll the engine, lock the table and apply pending completions
    pub(crate) fn enter(&self) -> SpinLockGuard<'_, Inner> {
        self.engine.poll();
        let mut inner = self.inner.lock();
        self.drain(&mut inner);
        inner
    }

    pub(crate) fn check_open(&self) -> SockResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(SockError::state(Errno::ESHUTDOWN));
        }
        Ok(())
    }

    /// Record a failure in `last_errno` and the socket's `last_error`
    pub(crate) fn track<T>(&self, handle: Option<SocketHandle>, result: SockResult<T>) -> SockResult<T> {
        if let Err(e) = &result {
            self.last_errno.store(e.raw_os_error(), Ordering::Relaxed);
            if let Some(h) = handle {
                if let Ok(scb) = self.inner.lock().table.live_mut(h) {
                    scb.last_error = Some(*e);
                }
            }
            kdebug!("socket {} call failed: {}", handle.unwrap_or_default(), e);
        }
        result
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Allocate a socket. `domain` must be `AF_INET`; `ty` selects TCP
    /// (`SOCK_STREAM`) or UDP (`SOCK_DGRAM`).
    pub fn socket(&self, domain: i32, ty: i32) -> SockResult<SocketHandle> {
        let result = self.do_socket(domain, ty);
        self.track(None, result)
    }

    fn do_socket(&self, domain: i32, ty: i32) -> SockResult<SocketHandle> {
        self.check_open()?;
        if domain != AF_INET {
            return Err(SockError::parameter(Errno::EAFNOSUPPORT));
        }
        let transport =
            Transport::from_socket_type(ty).ok_or(SockError::parameter(Errno::EPROTONOSUPPORT))?;

        let mut inner = self.enter();
        let h = inner
            .table
            .allocate(transport)
            .ok_or(SockError::resource(Errno::EMFILE))?;
        bump(&self.stats.sockets_opened, 1);
        kdebug!("socket {} {} created", h, transport);
        Ok(h)
    }

    /// Assign a local endpoint. Port 0 picks an ephemeral port.
    pub fn bind(&self, h: SocketHandle, addr: SockAddrIn) -> SockResult<()> {
        let result = self.do_bind(h, addr);
        self.track(Some(h), result)
    }

    fn do_bind(&self, h: SocketHandle, addr: SockAddrIn) -> SockResult<()> {
        self.check_open()?;
        let mut inner = self.enter();
        let scb = inner.table.live(h)?;
        usable(scb.state, || scb.fatal_error())?;
        if scb.state != SocketState::Created {
            return Err(SockError::state(Errno::EINVAL));
        }
        let transport = scb.transport;

        let local = if addr.has_port() {
            if inner.table.port_in_use(transport, addr.port) {
                return Err(SockError::resource(Errno::EADDRINUSE));
            }
            addr
        } else {
            let Inner { table, ports, .. } = &mut *inner;
            let port = ports.allocate(|p| table.port_in_use(transport, p))?;
            addr.with_port(port)
        };

        self.register_local(&mut inner, h, local)?;
        kdebug!("socket {} bound to {}", h, local);
        Ok(())
    }

    /// Open `local` in the engine and move `Created` to `Bound`
    fn register_local(&self, inner: &mut Inner, h: SocketHandle, local: SockAddrIn) -> SockResult<()> {
        let scb = inner.table.live(h)?;
        let corr = scb.corr(h);
        let transport = scb.transport;
        self.engine.open(corr, transport, local)?;

        let scb = inner.table.live_mut(h)?;
        scb.local = Some(local);
        if scb.state == SocketState::Created {
            scb.state = SocketState::Bound;
        }
        if transport == Transport::Udp {
            self.issue_receive(inner, h);
        }
        Ok(())
    }

    /// Bind an unbound socket to an ephemeral port on `INADDR_ANY`
    fn bind_ephemeral(&self, inner: &mut Inner, h: SocketHandle) -> SockResult<SockAddrIn> {
        let transport = inner.table.live(h)?.transport;
        let port = {
            let Inner { table, ports, .. } = &mut *inner;
            ports.allocate(|p| table.port_in_use(transport, p))?
        };
        let local = SockAddrIn::new(Ipv4Addr::UNSPECIFIED, port);
        self.register_local(inner, h, local)?;
        kdebug!("socket {} implicitly bound to {}", h, local);
        Ok(local)
    }

    /// Start accepting connections. `backlog` is accepted for
    /// compatibility; one connection is pending at a time.
    pub fn listen(&self, h: SocketHandle, backlog: i32) -> SockResult<()> {
        let result = self.do_listen(h, backlog);
        self.track(Some(h), result)
    }

    fn do_listen(&self, h: SocketHandle, backlog: i32) -> SockResult<()> {
        self.check_open()?;
        let mut inner = self.enter();
        let scb = inner.table.live(h)?;
        usable(scb.state, || scb.fatal_error())?;
        if scb.transport != Transport::Tcp {
            return Err(SockError::parameter(Errno::EOPNOTSUPP));
        }
        if scb.state != SocketState::Bound {
            return Err(SockError::state(Errno::EINVAL));
        }

        let scb = inner.table.live_mut(h)?;
        scb.role = Role::Listener;
        scb.state = SocketState::Listening;

        if let Err(e) = self.reserve_duplicate(&mut inner, h) {
            // Listening stands; accept() retries the reservation
            kwarn!("listener {} has no pending duplicate: {}", h, e);
            bump(&self.stats.rearm_failures, 1);
            if let Ok(scb) = inner.table.live_mut(h) {
                scb.last_error = Some(e);
            }
        }
        kdebug!("socket {} listening (backlog {})", h, backlog);
        Ok(())
    }

    /// Connect a TCP socket, or set the default peer of a UDP socket.
    ///
    /// A blocking TCP connect suspends until the handshake completes; a
    /// non-blocking one returns `EINPROGRESS` while it is underway.
    pub fn connect(&self, h: SocketHandle, addr: SockAddrIn) -> SockResult<()> {
        let result = self.do_connect(h, addr);
        self.track(Some(h), result)
    }

    fn do_connect(&self, h: SocketHandle, addr: SockAddrIn) -> SockResult<()> {
        self.check_open()?;
        if !addr.has_port() || addr.is_any() {
            return Err(SockError::parameter(Errno::EINVAL));
        }

        let mut inner = self.enter();
        let scb = inner.table.live(h)?;
        usable(scb.state, || scb.fatal_error())?;
        let transport = scb.transport;
        let creation = scb.creation;
        let blocking = scb.blocking.is_blocking();

        if transport == Transport::Udp {
            return self.connect_udp(&mut inner, h, addr);
        }

        match scb.state {
            SocketState::Created | SocketState::Bound => {}
            SocketState::Connecting => return Err(SockError::state(Errno::EALREADY)),
            SocketState::Connected | SocketState::Closing => {
                return Err(SockError::state(Errno::EISCONN))
            }
            SocketState::Listening => return Err(SockError::state(Errno::EOPNOTSUPP)),
            _ => return Err(SockError::state(Errno::EINVAL)),
        }

        let bound = scb.local;
        let local = match bound {
            Some(local) => local,
            None => self.bind_ephemeral(&mut inner, h)?,
        };

        let scb = inner.table.live_mut(h)?;
        scb.remote = Some(addr);
        scb.state = SocketState::Connecting;
        let corr = scb.corr(h);

        let issued = self.engine.connect(corr, transport, local, addr);
        if let Err(e) = self.settle(&mut inner, h, OpKind::Connect, issued) {
            let scb = inner.table.live_mut(h)?;
            scb.state = SocketState::Bound;
            scb.remote = None;
            return Err(e.into());
        }
        self.drain(&mut inner);
        kdebug!("socket {} connecting {} -> {}", h, local, addr);

        if !blocking {
            let scb = inner.table.live(h)?;
            return match scb.state {
                SocketState::Connected | SocketState::Closing => Ok(()),
                SocketState::FatalError => Err(SockError::transport(
                    scb.fatal_errno.unwrap_or(Errno::ECONNREFUSED),
                )),
                _ => Err(SockError::in_progress()),
            };
        }
        drop(inner);

        self.wait_on(h, creation, true, |inner| {
            let scb = inner.table.get(h)?;
            match scb.state {
                SocketState::Connected | SocketState::Closing => Some(Ok(())),
                SocketState::Connecting => None,
                _ => Some(Err(SockError::state(Errno::ENOTCONN))),
            }
        })
    }

    fn connect_udp(&self, inner: &mut Inner, h: SocketHandle, addr: SockAddrIn) -> SockResult<()> {
        let bound = inner.table.live(h)?.local;
        let local = match bound {
            Some(local) => local,
            None => self.bind_ephemeral(inner, h)?,
        };

        let scb = inner.table.live_mut(h)?;
        scb.remote = Some(addr);
        scb.state = SocketState::Connected;
        let corr = scb.corr(h);

        let issued = self.engine.connect(corr, Transport::Udp, local, addr);
        self.settle(inner, h, OpKind::Connect, issued)?;
        self.drain(inner);
        self.issue_receive(inner, h);
        kdebug!("socket {} default peer {}", h, addr);
        Ok(())
    }

    /// Take the next established connection.
    ///
    /// Returns the new socket and its remote endpoint. The listener keeps
    /// listening with a fresh pending duplicate.
    pub fn accept(&self, h: SocketHandle) -> SockResult<(SocketHandle, SockAddrIn)> {
        let result = self.do_accept(h);
        self.track(Some(h), result)
    }

    fn do_accept(&self, h: SocketHandle) -> SockResult<(SocketHandle, SockAddrIn)> {
        self.check_open()?;
        let (creation, blocking) = {
            let inner = self.enter();
            let scb = inner.table.live(h)?;
            usable(scb.state, || scb.fatal_error())?;
            if scb.state != SocketState::Listening {
                return Err(SockError::state(Errno::EINVAL));
            }
            (scb.creation, scb.blocking.is_blocking())
        };

        let (conn, peer) = self.wait_on(h, creation, blocking, |inner| self.try_accept(inner, h))?;
        kdebug!("listener {} accepted socket {} from {}", h, conn, peer);
        Ok((conn, peer))
    }

    /// Close a socket.
    ///
    /// Outstanding operations are cancelled; waiters on the socket wake
    /// with `ECANCELED`. The slot is forced to `Closed` after at most
    /// `close_grace` park intervals. Closing a listener also closes its
    /// pending duplicate.
    pub fn close(&self, h: SocketHandle) -> SockResult<()> {
        let result = self.check_open().and_then(|_| self.do_close(h));
        self.track(Some(h), result)
    }

    fn do_close(&self, h: SocketHandle) -> SockResult<()> {
        let targets = {
            let mut inner = self.enter();
            let scb = inner.table.live(h)?;
            let mut targets = vec![(h, scb.creation)];
            if scb.role == Role::Listener && !scb.peer_slot.is_none() {
                if let Some(dup) = inner.table.get(scb.peer_slot) {
                    targets.push((scb.peer_slot, dup.creation));
                }
            }
            for &(t, _) in &targets {
                self.begin_close(&mut inner, t);
            }
            self.drain(&mut inner);
            targets
        };
        // Waiters on these sockets must see close_pending
        self.queue.notify();

        for _ in 0..self.config.close_grace {
            let seen = self.queue.epoch();
            let settled = {
                let inner = self.enter();
                targets.iter().all(|&(t, creation)| {
                    inner
                        .table
                        .get(t)
                        .map_or(true, |scb| scb.creation != creation || scb.in_flight == 0)
                })
            };
            if settled {
                break;
            }
            self.queue.park(seen, self.config.park_interval);
        }

        let mut inner = self.enter();
        for &(t, creation) in &targets {
            self.finish_close(&mut inner, t, creation);
        }
        drop(inner);
        self.queue.notify();
        kdebug!("socket {} closed", h);
        Ok(())
    }

    /// Mark closing, cancel outstanding work, release the engine endpoint
    fn begin_close(&self, inner: &mut Inner, t: SocketHandle) {
        let Some(scb) = inner.table.get_mut(t) else {
            return;
        };
        scb.close_pending = true;
        let corr = scb.corr(t);
        let transport = scb.transport;
        let outstanding = scb.in_flight & !(OpKind::Close.bit() | OpKind::Cancel.bit()) != 0;

        if outstanding {
            let issued = self.engine.cancel(corr, transport);
            if let Err(e) = self.settle(inner, t, OpKind::Cancel, issued) {
                kwarn!("socket {} cancel rejected: {}", t, e);
            }
        }
        let issued = self.engine.close(corr, transport);
        if let Err(e) = self.settle(inner, t, OpKind::Close, issued) {
            kwarn!("socket {} engine close rejected: {}", t, e);
        }
    }

    /// Force the slot to `Closed` unless it was already recycled
    fn finish_close(&self, inner: &mut Inner, t: SocketHandle, creation: CreationId) {
        let Some(scb) = inner.table.get(t) else {
            return;
        };
        if scb.creation != creation || !scb.state.is_allocated() {
            return;
        }
        if scb.in_flight != 0 {
            kwarn!("socket {} forced closed with ops {:#04x} in flight", t, scb.in_flight);
        }
        if scb.role == Role::Duplicate {
            let listener = scb.peer_slot;
            if let Some(l) = inner.table.get_mut(listener) {
                if l.peer_slot == t {
                    l.peer_slot = SocketHandle::NONE;
                }
            }
        }
        inner.table.release(t);
        bump(&self.stats.sockets_closed, 1);
    }

    /// Close every socket and refuse further calls
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let open: Vec<SocketHandle> = self.inner.lock().table.allocated().collect();
        for h in open {
            // A listener's duplicate goes with its listener
            if let Err(e) = self.do_close(h) {
                kdebug!("shutdown: socket {} already gone: {}", h, e);
            }
        }
        kinfo!("layer shut down: {}", self.stats());
    }

    // ------------------------------------------------------------------
    // Data transfer
    // ------------------------------------------------------------------

    /// Send on a connected socket. Returns the number of bytes accepted,
    /// which is always the whole payload.
    ///
    /// While an earlier payload is still in flight the call fails at once
    /// with a resource error (`EAGAIN`). A blocking call otherwise waits
    /// until its own payload is confirmed.
    pub fn send(&self, h: SocketHandle, data: &[u8]) -> SockResult<usize> {
        let result = self.do_send(h, data, None);
        self.track(Some(h), result)
    }

    /// Send a datagram to `to` (UDP) or on the connection (TCP, `to` is
    /// ignored). An unbound UDP socket is bound to an ephemeral port first.
    pub fn sendto(&self, h: SocketHandle, data: &[u8], to: SockAddrIn) -> SockResult<usize> {
        let result = self.do_send(h, data, Some(to));
        self.track(Some(h), result)
    }

    fn do_send(&self, h: SocketHandle, data: &[u8], to: Option<SockAddrIn>) -> SockResult<usize> {
        self.check_open()?;
        if data.is_empty() {
            return Err(SockError::parameter(Errno::EINVAL));
        }

        let (creation, blocking) = {
            let mut inner = self.enter();
            let scb = inner.table.live(h)?;
            usable(scb.state, || scb.fatal_error())?;
            if data.len() > scb.sendbuf.capacity() {
                return Err(SockError::resource(Errno::ENOBUFS));
            }
            let state = scb.state;
            let unbound = scb.local.is_none();
            let has_dest = to.is_some() || scb.remote.is_some();
            let busy = scb.has_op(OpKind::Send);
            let (creation, blocking) = (scb.creation, scb.blocking.is_blocking());

            match scb.transport {
                Transport::Tcp => match state {
                    SocketState::Connected => {}
                    SocketState::Closing => return Err(SockError::state(Errno::EPIPE)),
                    _ => return Err(SockError::state(Errno::ENOTCONN)),
                },
                Transport::Udp => {
                    if !has_dest {
                        return Err(SockError::state(Errno::EDESTADDRREQ));
                    }
                    if unbound {
                        self.bind_ephemeral(&mut inner, h)?;
                    }
                }
            }
            // One payload at a time, whatever the blocking mode
            if busy {
                return Err(SockError::busy());
            }
            (creation, blocking)
        };

        let len = data.len();
        let mut loaded = false;
        self.wait_on(h, creation, blocking, |inner| {
            let scb = inner.table.get_mut(h)?;
            if !loaded {
                if scb.has_op(OpKind::Send) {
                    return Some(Err(SockError::busy()));
                }
                if scb.transport == Transport::Tcp && scb.state != SocketState::Connected {
                    return Some(Err(SockError::state(Errno::EPIPE)));
                }
                scb.sendbuf.load(data);
                scb.send_to = match scb.transport {
                    Transport::Udp => to.or(scb.remote),
                    Transport::Tcp => None,
                };
                if let Err(e) = self.issue_send(inner, h) {
                    if let Some(scb) = inner.table.get_mut(h) {
                        scb.sendbuf.reset();
                        scb.send_to = None;
                    }
                    return Some(Err(e.into()));
                }
                loaded = true;
                self.drain(inner);
                if !blocking {
                    return Some(Ok(len));
                }
            }
            let scb = inner.table.get(h)?;
            if scb.has_op(OpKind::Send) {
                None
            } else {
                Some(Ok(len))
            }
        })
    }

    /// Receive into `buf`. Returns 0 once a TCP peer has closed and the
    /// ring is drained.
    pub fn recv(&self, h: SocketHandle, buf: &mut [u8]) -> SockResult<usize> {
        let result = self.do_recv(h, buf).map(|(n, _)| n);
        self.track(Some(h), result)
    }

    /// Like `recv`, also returning the source endpoint: the sender of the
    /// most recent datagram (UDP) or the connected peer (TCP).
    pub fn recvfrom(
        &self,
        h: SocketHandle,
        buf: &mut [u8],
    ) -> SockResult<(usize, Option<SockAddrIn>)> {
        let result = self.do_recv(h, buf);
        self.track(Some(h), result)
    }

    fn do_recv(
        &self,
        h: SocketHandle,
        buf: &mut [u8],
    ) -> SockResult<(usize, Option<SockAddrIn>)> {
        self.check_open()?;
        if buf.is_empty() {
            return Err(SockError::parameter(Errno::EINVAL));
        }

        let (creation, blocking) = {
            let inner = self.enter();
            let scb = inner.table.live(h)?;
            usable(scb.state, || scb.fatal_error())?;
            match scb.transport {
                Transport::Tcp if !scb.state.is_established() => {
                    return Err(SockError::state(Errno::ENOTCONN))
                }
                Transport::Udp if scb.local.is_none() => {
                    return Err(SockError::state(Errno::EINVAL))
                }
                _ => {}
            }
            (scb.creation, scb.blocking.is_blocking())
        };

        self.wait_on(h, creation, blocking, |inner| {
            let scb = inner.table.get_mut(h)?;
            if !scb.ring.is_empty() {
                let n = scb.ring.pop_into(buf);
                let from = match scb.transport {
                    Transport::Udp => scb.udp_from,
                    Transport::Tcp => scb.remote,
                };
                // Space was freed: re-arm if the ring had filled up
                self.issue_receive(inner, h);
                return Some(Ok((n, from)));
            }
            if scb.transport == Transport::Tcp && scb.fin_received {
                return Some(Ok((0, scb.remote)));
            }
            None
        })
    }

    // ------------------------------------------------------------------
    // Control and inspection
    // ------------------------------------------------------------------

    /// `F_GETFL` returns `O_NONBLOCK` or 0; `F_SETFL` sets the blocking
    /// mode from `arg & O_NONBLOCK` and returns 0.
    pub fn fcntl(&self, h: SocketHandle, cmd: i32, arg: i32) -> SockResult<i32> {
        let result = self.do_fcntl(h, cmd, arg);
        self.track(Some(h), result)
    }

    fn do_fcntl(&self, h: SocketHandle, cmd: i32, arg: i32) -> SockResult<i32> {
        self.check_open()?;
        let mut inner = self.enter();
        let scb = inner.table.live_mut(h)?;
        usable(scb.state, || scb.fatal_error())?;
        if cmd == F_GETFL {
            Ok(match scb.blocking {
                BlockingMode::NonBlocking => O_NONBLOCK,
                BlockingMode::Blocking => 0,
            })
        } else if cmd == F_SETFL {
            scb.blocking = if arg & O_NONBLOCK != 0 {
                BlockingMode::NonBlocking
            } else {
                BlockingMode::Blocking
            };
            Ok(0)
        } else {
            Err(SockError::parameter(Errno::EINVAL))
        }
    }

    /// Shorthand for `fcntl(F_SETFL, O_NONBLOCK)`
    pub fn set_nonblocking(&self, h: SocketHandle, nonblocking: bool) -> SockResult<()> {
        let flags = if nonblocking { O_NONBLOCK } else { 0 };
        self.fcntl(h, F_SETFL, flags).map(|_| ())
    }

    /// Local endpoint; `0.0.0.0:0` while unbound
    pub fn getsockname(&self, h: SocketHandle) -> SockResult<SockAddrIn> {
        let result = self.enter().table.live(h).map(|scb| scb.local.unwrap_or_default());
        self.track(Some(h), result)
    }

    /// Remote endpoint of a connected socket
    pub fn getpeername(&self, h: SocketHandle) -> SockResult<SockAddrIn> {
        let result = {
            let inner = self.enter();
            inner.table.live(h).and_then(|scb| match scb.state {
                SocketState::Connected | SocketState::Closing => {
                    scb.remote.ok_or(SockError::state(Errno::ENOTCONN))
                }
                _ => Err(SockError::state(Errno::ENOTCONN)),
            })
        };
        self.track(Some(h), result)
    }

    /// Read and clear the socket's pending error (`SO_ERROR`)
    pub fn socket_error(&self, h: SocketHandle) -> SockResult<Option<SockError>> {
        let mut inner = self.enter();
        let scb = inner.table.live_mut(h)?;
        Ok(scb.last_error.take())
    }

    /// Errno of the most recent failed call on this layer
    pub fn last_errno(&self) -> Option<Errno> {
        match self.last_errno.load(Ordering::Relaxed) {
            0 => None,
            raw => Some(Errno::from_raw(raw)),
        }
    }

    /// Lifecycle state of any slot, including `Closed` ones
    pub fn state(&self, h: SocketHandle) -> SockResult<SocketState> {
        self.enter()
            .table
            .get(h)
            .map(|scb| scb.state)
            .ok_or(SockError::bad_handle())
    }

    /// Copy of a slot's control block
    pub fn snapshot(&self, h: SocketHandle) -> SockResult<ScbSnapshot> {
        self.enter()
            .table
            .get(h)
            .map(|scb| scb.snapshot(h))
            .ok_or(SockError::bad_handle())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of slots in the table
    pub fn capacity(&self) -> usize {
        self.config.total_slots()
    }
}

impl<E: TransportEngine> Drop for SocketLayer<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Refuse everything on a socket in `FatalError`
#[inline]
fn usable(state: SocketState, fatal: impl FnOnce() -> SockError) -> SockResult<()> {
    if state.is_fatal() {
        Err(fatal())
    } else {
        Ok(())
    }
}
