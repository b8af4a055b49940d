mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use coopsock::{Errno, FdSet, SockAddrIn, SocketHandle};
use coopsock_core::TickSource;

use common::*;

fn set(handles: &[SocketHandle]) -> FdSet {
    handles.iter().copied().collect()
}

#[test]
fn test_zero_timeout_polls_once() {
    let layer = layer();
    let (_l, client, server) = connected(&layer, 7000);

    let mut read = set(&[client, server]);
    assert_eq!(layer.select(Some(&mut read), None, None, Some(0)).unwrap(), 0);
    assert!(read.is_empty());
}

#[test]
fn test_buffered_data_is_readable() {
    let layer = layer();
    let (_l, client, server) = connected(&layer, 7001);
    layer.send(client, b"ready").unwrap();

    let mut read = set(&[client, server]);
    assert_eq!(layer.select(Some(&mut read), None, None, Some(0)).unwrap(), 1);
    assert_eq!(read.iter().collect::<Vec<_>>(), vec![server]);

    // Level-triggered: still readable until drained
    let mut read = set(&[server]);
    assert_eq!(layer.select(Some(&mut read), None, None, Some(0)).unwrap(), 1);
    let mut buf = [0u8; 8];
    layer.recv(server, &mut buf).unwrap();
    let mut read = set(&[server]);
    assert_eq!(layer.select(Some(&mut read), None, None, Some(0)).unwrap(), 0);
}

#[test]
fn test_peer_close_is_readable() {
    let layer = layer();
    let (_l, client, server) = connected(&layer, 7002);
    layer.close(client).unwrap();

    let mut read = set(&[server]);
    assert_eq!(layer.select(Some(&mut read), None, None, None).unwrap(), 1);
    let mut buf = [0u8; 8];
    assert_eq!(layer.recv(server, &mut buf).unwrap(), 0);
}

#[test]
fn test_connected_socket_is_writable() {
    let layer = layer();
    let (_l, client, server) = connected(&layer, 7003);
    let mut write = set(&[client, server]);
    assert_eq!(layer.select(None, Some(&mut write), None, Some(0)).unwrap(), 2);

    // A fresh socket is not
    let idle = tcp(&layer);
    let mut write = set(&[idle]);
    assert_eq!(layer.select(None, Some(&mut write), None, Some(0)).unwrap(), 0);
}

#[test]
fn test_nonblocking_connect_completes_writable() {
    let layer = layer();
    let _l = listening(&layer, 7004);
    layer.engine().hold_connects();

    let client = tcp(&layer);
    layer.set_nonblocking(client, true).unwrap();
    let err = layer.connect(client, SockAddrIn::localhost(7004)).unwrap_err();
    assert_eq!(err.errno(), Errno::EINPROGRESS);
    assert_eq!(
        layer.connect(client, SockAddrIn::localhost(7004)).unwrap_err().errno(),
        Errno::EALREADY
    );

    let mut write = set(&[client]);
    assert_eq!(layer.select(None, Some(&mut write), None, Some(0)).unwrap(), 0);

    assert_eq!(layer.engine().release_connects(), 1);
    let mut write = set(&[client]);
    assert_eq!(layer.select(None, Some(&mut write), None, None).unwrap(), 1);
    assert!(write.contains(client));
    assert_eq!(
        layer.connect(client, SockAddrIn::localhost(7004)).unwrap_err().errno(),
        Errno::EISCONN
    );
}

#[test]
fn test_reset_socket_in_error_set() {
    let layer = layer();
    let (_l, client, server) = connected(&layer, 7005);
    assert!(layer.engine().inject_reset(server));

    let mut error = set(&[client, server]);
    assert_eq!(layer.select(None, None, Some(&mut error), Some(0)).unwrap(), 1);
    assert_eq!(error.iter().collect::<Vec<_>>(), vec![server]);
}

#[test]
fn test_closed_handle_in_error_set() {
    let layer = layer();
    let s = tcp(&layer);
    layer.close(s).unwrap();
    let mut error = set(&[s]);
    assert_eq!(layer.select(None, None, Some(&mut error), Some(0)).unwrap(), 1);
}

#[test]
fn test_handle_beyond_table() {
    let layer = layer();
    let mut read = set(&[SocketHandle::new(100)]);
    let err = layer.select(Some(&mut read), None, None, Some(0)).unwrap_err();
    assert_eq!(err.errno(), Errno::EBADF);
    assert_eq!(layer.last_errno(), Some(Errno::EBADF));
}

#[test]
fn test_timeout_counts_ticks() {
    let (layer, clock) = manual_layer(config());
    let (_l, _client, server) = connected(&layer, 7006);
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                clock.advance(1);
                std::thread::sleep(Duration::from_millis(1));
            }
        });

        let mut read = set(&[server]);
        let start = clock.now_ticks();
        let ready = layer.select(Some(&mut read), None, None, Some(20));
        let waited = clock.now_ticks() - start;
        done.store(true, Ordering::Release);

        assert_eq!(ready.unwrap(), 0);
        assert!(waited >= 20);
    });
}

#[test]
fn test_data_arriving_wakes_select() {
    let layer = layer();
    let (_l, client, server) = connected(&layer, 7007);

    std::thread::scope(|s| {
        let waiter = s.spawn(|| {
            let mut read = set(&[server]);
            let n = layer.select(Some(&mut read), None, None, None).unwrap();
            (n, read)
        });
        std::thread::sleep(Duration::from_millis(10));
        layer.send(client, b"wake").unwrap();

        let (n, read) = waiter.join().unwrap();
        assert_eq!(n, 1);
        assert!(read.contains(server));
    });
}

#[test]
fn test_unused_slot_not_in_error_set() {
    let layer = layer();
    let used = tcp(&layer);
    layer.close(used).unwrap();
    let unused = SocketHandle::new(layer.capacity() as u32 - 1);
    assert_eq!(layer.snapshot(unused).unwrap().creation, coopsock_core::CreationId::UNSET);

    let mut error = set(&[used, unused]);
    assert_eq!(layer.select(None, None, Some(&mut error), Some(0)).unwrap(), 1);
    assert_eq!(error.iter().collect::<Vec<_>>(), vec![used]);
}
