//! Loopback echo
//!
//! One echo server and a set of client threads sharing a `SocketLayer`
//! over the in-process loopback engine. Each client connects, sends
//! `rounds` messages, checks every echo and closes. The server accepts
//! exactly one connection per client, echoing each on its own thread.
//!
//! Usage:
//!     cargo run --release -p loop-echo -- [clients] [rounds] [port]
//!
//! Tuning comes from the `COOPSOCK_*` environment variables, logging from
//! `COOPSOCK_LOG_LEVEL` (0=off .. 5=trace).

use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use coopsock::{LayerConfig, SockAddrIn, SockError, SockResult, SocketHandle, SocketLayer};
use coopsock_core::bsd::{AF_INET, SOCK_STREAM};
use coopsock_core::kprint;
use coopsock_core::{kdebug, kerror, kinfo, kwarn, Errno};
use coopsock_loopback::{LoopbackEngine, MonotonicClock, XorShiftEntropy};

type Layer = SocketLayer<LoopbackEngine>;

const ECHO_BUF: usize = 512;

struct Args {
    clients: usize,
    rounds: usize,
    port: u16,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self {
            clients: args.get(1).and_then(|s| s.parse().ok()).unwrap_or(4),
            rounds: args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100),
            port: args.get(3).and_then(|s| s.parse().ok()).unwrap_or(7777),
        }
    }
}

fn main() -> ExitCode {
    kprint::init();
    let args = Args::parse();

    let mut config = LayerConfig::from_env();
    // Listener, its pending duplicate, and both ends of every connection
    let needed = 2 + 2 * args.clients;
    if config.tcp_slots < needed {
        kwarn!("raising tcp slots {} -> {} for {} clients", config.tcp_slots, needed, args.clients);
        config = config.tcp_slots(needed);
    }
    config.print();

    let layer = match SocketLayer::open(
        config,
        Arc::new(MonotonicClock::millis()),
        Box::new(XorShiftEntropy::from_time()),
        LoopbackEngine::new,
    ) {
        Ok(layer) => Arc::new(layer),
        Err(e) => {
            kerror!("loop-echo: bad configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    kinfo!(
        "loop-echo: {} clients x {} rounds on port {}",
        args.clients,
        args.rounds,
        args.port
    );
    let start = Instant::now();

    let outcome = run(&layer, &args);
    let elapsed = start.elapsed().as_secs_f64();
    eprintln!("[{:.3}s] {}", elapsed, layer.stats());
    layer.shutdown();

    match outcome {
        Ok(echoed) => {
            kinfo!("loop-echo: {} messages echoed", echoed);
            ExitCode::SUCCESS
        }
        Err(e) => {
            kerror!("loop-echo: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(layer: &Arc<Layer>, args: &Args) -> SockResult<u64> {
    let listener = layer.socket(AF_INET, SOCK_STREAM)?;
    layer.bind(listener, SockAddrIn::new(Ipv4Addr::UNSPECIFIED, args.port))?;
    layer.listen(listener, args.clients as i32)?;

    let server = {
        let layer = Arc::clone(layer);
        let expected = args.clients;
        thread::spawn(move || serve(&layer, listener, expected))
    };

    let clients: Vec<JoinHandle<SockResult<u64>>> = (0..args.clients)
        .map(|id| {
            let layer = Arc::clone(layer);
            let (port, rounds) = (args.port, args.rounds);
            thread::spawn(move || client(&layer, id, port, rounds))
        })
        .collect();

    let mut echoed = 0;
    let mut failure = None;
    for handle in clients {
        match joined(handle) {
            Ok(n) => echoed += n,
            Err(e) => failure = Some(e),
        }
    }
    if let Err(e) = joined(server) {
        failure.get_or_insert(e);
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(echoed),
    }
}

fn joined<T>(handle: JoinHandle<SockResult<T>>) -> SockResult<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(SockError::state(Errno::EOWNERDEAD)))
}

/// Accept `expected` connections, echo each on its own thread
fn serve(layer: &Arc<Layer>, listener: SocketHandle, expected: usize) -> SockResult<u64> {
    let mut workers = Vec::with_capacity(expected);
    for _ in 0..expected {
        let (conn, peer) = layer.accept(listener)?;
        kdebug!("server: socket {} from {}", conn, peer);
        let layer = Arc::clone(layer);
        workers.push(thread::spawn(move || echo(&layer, conn)));
    }
    layer.close(listener)?;

    let mut bytes = 0;
    for w in workers {
        bytes += joined(w)?;
    }
    kinfo!("server: echoed {} bytes over {} connections", bytes, expected);
    Ok(bytes)
}

fn echo(layer: &Layer, conn: SocketHandle) -> SockResult<u64> {
    let mut buf = [0u8; ECHO_BUF];
    let mut total = 0u64;
    loop {
        let n = layer.recv(conn, &mut buf)?;
        if n == 0 {
            break;
        }
        layer.send(conn, &buf[..n])?;
        total += n as u64;
    }
    layer.close(conn)?;
    Ok(total)
}

fn client(layer: &Layer, id: usize, port: u16, rounds: usize) -> SockResult<u64> {
    let sock = layer.socket(AF_INET, SOCK_STREAM)?;
    layer.connect(sock, SockAddrIn::localhost(port))?;
    kdebug!("client {}: socket {} connected from {}", id, sock, layer.getsockname(sock)?);

    let mut buf = [0u8; ECHO_BUF];
    for round in 0..rounds {
        let msg = format!("ping {}:{}", id, round);
        layer.send(sock, msg.as_bytes())?;

        let mut got = 0;
        while got < msg.len() {
            let n = layer.recv(sock, &mut buf[got..])?;
            if n == 0 {
                return Err(SockError::transport(Errno::ECONNRESET));
            }
            got += n;
        }
        if &buf[..got] != msg.as_bytes() {
            kerror!("client {}: round {} echo mismatch", id, round);
            return Err(SockError::transport(Errno::EBADMSG));
        }
    }
    layer.close(sock)?;
    Ok(rounds as u64)
}
