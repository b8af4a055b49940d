mod common;

use coopsock::bsd::{AF_INET, EPHEMERAL_PORT_MIN, F_GETFL, F_SETFL, O_NONBLOCK, SOCK_STREAM};
use coopsock::{Errno, ErrorKind, Role, SockAddrIn, SocketState};

use common::*;

#[test]
fn test_listen_reserves_duplicate() {
    let layer = layer();
    let l = listening(&layer, 7000);

    let snap = layer.snapshot(l).unwrap();
    assert_eq!(snap.state, SocketState::Listening);
    assert_eq!(snap.role, Role::Listener);
    let dup = snap.peer_slot.expect("pending duplicate");
    assert_ne!(dup, l);

    let d = layer.snapshot(dup).unwrap();
    assert_eq!(d.role, Role::Duplicate);
    assert_eq!(d.state, SocketState::Connecting);
    assert_eq!(d.peer_slot, Some(l));
    assert_eq!(d.local, Some(SockAddrIn::localhost(7000)));
    assert!(d.has_op(coopsock_core::OpKind::Accept));
    assert_eq!(layer.engine().pending_accepts(), 1);
}

#[test]
fn test_double_close_is_ebadf() {
    let layer = layer();
    let s = tcp(&layer);
    layer.close(s).unwrap();

    let err = layer.close(s).unwrap_err();
    assert_eq!(err.errno(), Errno::EBADF);
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert_eq!(layer.last_errno(), Some(Errno::EBADF));
    assert_eq!(layer.state(s).unwrap(), SocketState::Closed);
}

#[test]
fn test_out_of_range_handle() {
    let layer = layer();
    let bogus = coopsock::SocketHandle::new(200);
    assert_eq!(layer.state(bogus).unwrap_err().errno(), Errno::EBADF);
    assert_eq!(
        layer.bind(bogus, SockAddrIn::localhost(1)).unwrap_err().errno(),
        Errno::EBADF
    );
}

#[test]
fn test_unsupported_domain_and_type() {
    let layer = layer();
    assert_eq!(
        layer.socket(libc::AF_INET6, SOCK_STREAM).unwrap_err().errno(),
        Errno::EAFNOSUPPORT
    );
    assert_eq!(
        layer.socket(AF_INET, libc::SOCK_RAW).unwrap_err().errno(),
        Errno::EPROTONOSUPPORT
    );
}

#[test]
fn test_table_exhaustion() {
    let layer = layer_with(config().tcp_slots(2).udp_slots(1));
    tcp(&layer);
    tcp(&layer);
    let err = layer.socket(AF_INET, SOCK_STREAM).unwrap_err();
    assert_eq!(err.errno(), Errno::EMFILE);
    assert_eq!(err.kind(), ErrorKind::Resource);

    // The UDP region is separate
    udp(&layer);
}

#[test]
fn test_slot_reuse_gets_new_creation() {
    let layer = layer();
    let s = tcp(&layer);
    let first = layer.snapshot(s).unwrap().creation;
    layer.close(s).unwrap();

    let again = tcp(&layer);
    assert_eq!(again, s);
    assert!(layer.snapshot(again).unwrap().creation > first);
}

#[test]
fn test_bind_rules() {
    let layer = layer();
    let a = tcp(&layer);
    layer.bind(a, SockAddrIn::localhost(8080)).unwrap();
    assert_eq!(layer.getsockname(a).unwrap(), SockAddrIn::localhost(8080));

    // Already bound
    let err = layer.bind(a, SockAddrIn::localhost(8081)).unwrap_err();
    assert_eq!(err.errno(), Errno::EINVAL);

    // Port taken by another TCP socket
    let b = tcp(&layer);
    let err = layer.bind(b, SockAddrIn::localhost(8080)).unwrap_err();
    assert_eq!(err.errno(), Errno::EADDRINUSE);

    // Same port over UDP is fine
    let u = udp(&layer);
    layer.bind(u, SockAddrIn::localhost(8080)).unwrap();
}

#[test]
fn test_ephemeral_ports_unique() {
    let layer = layer_with(config().udp_slots(8));
    let mut ports = Vec::new();
    for _ in 0..8 {
        let u = udp(&layer);
        layer.bind(u, SockAddrIn::localhost(0)).unwrap();
        let port = layer.getsockname(u).unwrap().port;
        assert!(port >= EPHEMERAL_PORT_MIN);
        ports.push(port);
    }
    let mut unique = ports.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), ports.len());
}

#[test]
fn test_listen_rules() {
    let layer = layer();
    let u = udp(&layer);
    layer.bind(u, SockAddrIn::localhost(9000)).unwrap();
    let err = layer.listen(u, 1).unwrap_err();
    assert_eq!(err.errno(), Errno::EOPNOTSUPP);

    let t = tcp(&layer);
    let err = layer.listen(t, 1).unwrap_err();
    assert_eq!(err.errno(), Errno::EINVAL);
    assert_eq!(layer.state(t).unwrap(), SocketState::Created);
}

#[test]
fn test_fcntl_flags() {
    let layer = layer();
    let s = tcp(&layer);
    assert_eq!(layer.fcntl(s, F_GETFL, 0).unwrap(), 0);
    layer.fcntl(s, F_SETFL, O_NONBLOCK).unwrap();
    assert_eq!(layer.fcntl(s, F_GETFL, 0).unwrap(), O_NONBLOCK);
    layer.set_nonblocking(s, false).unwrap();
    assert_eq!(layer.fcntl(s, F_GETFL, 0).unwrap(), 0);

    let err = layer.fcntl(s, libc::F_GETFD, 0).unwrap_err();
    assert_eq!(err.errno(), Errno::EINVAL);
}

#[test]
fn test_names_before_connect() {
    let layer = layer();
    let s = tcp(&layer);
    assert_eq!(layer.getsockname(s).unwrap(), SockAddrIn::UNSPECIFIED);
    assert_eq!(layer.getpeername(s).unwrap_err().errno(), Errno::ENOTCONN);
}

#[test]
fn test_connect_refused_is_fatal() {
    let layer = layer();
    let s = tcp(&layer);
    let err = layer.connect(s, SockAddrIn::localhost(4444)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.errno(), Errno::ECONNREFUSED);
    assert_eq!(layer.state(s).unwrap(), SocketState::FatalError);

    // Everything but close keeps failing
    let err = layer.send(s, b"x").unwrap_err();
    assert_eq!(err.errno(), Errno::ECONNREFUSED);
    layer.close(s).unwrap();
}

#[test]
fn test_connect_argument_checks() {
    let layer = layer();
    let s = tcp(&layer);
    let err = layer.connect(s, SockAddrIn::localhost(0)).unwrap_err();
    assert_eq!(err.errno(), Errno::EINVAL);

    let l = listening(&layer, 7100);
    let err = layer.connect(l, SockAddrIn::localhost(7100)).unwrap_err();
    assert_eq!(err.errno(), Errno::EOPNOTSUPP);
}

#[test]
fn test_close_listener_takes_duplicate() {
    let layer = layer();
    let l = listening(&layer, 7200);
    let dup = layer.snapshot(l).unwrap().peer_slot.unwrap();

    layer.close(l).unwrap();
    assert_eq!(layer.state(l).unwrap(), SocketState::Closed);
    assert_eq!(layer.state(dup).unwrap(), SocketState::Closed);
    assert_eq!(layer.engine().pending_accepts(), 0);

    // Port is free again
    listening(&layer, 7200);
}

#[test]
fn test_shutdown_refuses_calls() {
    let layer = layer();
    let (_l, client, _server) = connected(&layer, 7300);
    layer.shutdown();

    for i in 0..layer.capacity() {
        let h = coopsock::SocketHandle::new(i as u32);
        assert_eq!(layer.state(h).unwrap(), SocketState::Closed);
    }
    assert_eq!(layer.state(client).unwrap(), SocketState::Closed);
    let err = layer.socket(AF_INET, SOCK_STREAM).unwrap_err();
    assert_eq!(err.errno(), Errno::ESHUTDOWN);

    // Second shutdown is a no-op
    layer.shutdown();
}
