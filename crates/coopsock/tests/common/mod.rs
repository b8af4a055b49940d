//! Shared setup for the scenario tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use coopsock::bsd::{AF_INET, SOCK_DGRAM, SOCK_STREAM};
use coopsock::{LayerConfig, SockAddrIn, SocketHandle, SocketLayer};
use coopsock_loopback::{LoopbackEngine, ManualClock, MonotonicClock, XorShiftEntropy};

pub type Layer = SocketLayer<LoopbackEngine>;

/// Default configuration with a short park interval
pub fn config() -> LayerConfig {
    LayerConfig::new().park_interval(Duration::from_micros(200))
}

pub fn layer() -> Layer {
    layer_with(config())
}

pub fn layer_with(config: LayerConfig) -> Layer {
    SocketLayer::open(
        config,
        Arc::new(MonotonicClock::millis()),
        Box::new(XorShiftEntropy::new(0x5eed)),
        LoopbackEngine::new,
    )
    .expect("layer opens")
}

/// Layer whose `select` timeouts only advance when the test says so
pub fn manual_layer(config: LayerConfig) -> (Layer, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let layer = SocketLayer::open(
        config,
        clock.clone(),
        Box::new(XorShiftEntropy::new(0x5eed)),
        LoopbackEngine::new,
    )
    .expect("layer opens");
    (layer, clock)
}

pub fn tcp(layer: &Layer) -> SocketHandle {
    layer.socket(AF_INET, SOCK_STREAM).expect("tcp socket")
}

pub fn udp(layer: &Layer) -> SocketHandle {
    layer.socket(AF_INET, SOCK_DGRAM).expect("udp socket")
}

/// TCP socket listening on 127.0.0.1:`port`
pub fn listening(layer: &Layer, port: u16) -> SocketHandle {
    let l = tcp(layer);
    layer.bind(l, SockAddrIn::localhost(port)).expect("bind");
    layer.listen(l, 4).expect("listen");
    l
}

/// Returns (listener, client, accepted server side)
pub fn connected(layer: &Layer, port: u16) -> (SocketHandle, SocketHandle, SocketHandle) {
    let l = listening(layer, port);
    let client = tcp(layer);
    layer
        .connect(client, SockAddrIn::localhost(port))
        .expect("connect");
    let (server, _) = layer.accept(l).expect("accept");
    (l, client, server)
}

/// Read exactly `len` bytes, or fewer if the peer closes
pub fn recv_exact(layer: &Layer, h: SocketHandle, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut buf = [0u8; 256];
    while out.len() < len {
        let want = (len - out.len()).min(buf.len());
        let n = layer.recv(h, &mut buf[..want]).expect("recv");
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

/// Spin until `cond` holds, failing after two seconds
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(1));
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}
