//! Integration tests for adapters_socket crate
//!
//! These tests drive the transport through its public API against real loopback sockets.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use adapters_socket::*;
use entities_network::{AddressFamily, ProtocolSupport, SocketAddress, Timeout};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn nonblocking_tcp(family: AddressFamily) -> SocketHandle {
    SocketHandle::create(SocketType::Stream, family)
        .unwrap()
        .set_blocking(false)
        .unwrap()
}

#[test]
fn test_resolve_bind_listen_connect_accept() {
    init_logger();
    let bind_addr = AddressResolver::resolve_for_bind("127.0.0.1", 0, ProtocolSupport::Ipv4Only).unwrap();
    let (listener, bound) = ConnectionEstablisher::bind(nonblocking_tcp(AddressFamily::Ipv4), &bind_addr).unwrap();
    let listener = ConnectionEstablisher::listen(listener, 8).unwrap();

    let target = AddressResolver::resolve_all("127.0.0.1", bound.port(), ProtocolSupport::Ipv4Only, false)
        .unwrap()
        .into_vec();
    assert_eq!(target, vec![bound]);

    let client = ConnectionEstablisher::connect(
        nonblocking_tcp(AddressFamily::Ipv4),
        &target[0],
        Timeout::from_millis(5_000),
    )
    .unwrap()
    .into_handle()
    .set_blocking(true)
    .unwrap();
    let server = ConnectionEstablisher::accept(&listener, Timeout::from_millis(5_000))
        .unwrap()
        .set_blocking(true)
        .unwrap();

    let mut client_stream = client.into_tcp_stream();
    let mut server_stream = server.into_tcp_stream();
    client_stream.write_all(b"ping").unwrap();
    let mut buf = [0u8; 4];
    server_stream.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"ping");
}

#[test]
fn test_connect_to_closed_port_is_refused() {
    init_logger();
    let (idle, closed) = ConnectionEstablisher::bind(
        SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4).unwrap(),
        &SocketAddress::loopback(AddressFamily::Ipv4, 0),
    )
    .unwrap();

    let err = ConnectionEstablisher::connect(nonblocking_tcp(AddressFamily::Ipv4), &closed, Timeout::Infinite)
        .unwrap_err();
    assert!(matches!(
        err,
        TransportError::ConnectionRefused(_) | TransportError::ConnectFailed(_)
    ));
    drop(idle);
}

#[cfg(target_os = "linux")]
#[test]
fn test_connect_to_saturated_listener_times_out() {
    init_logger();
    let (listener, bound) = ConnectionEstablisher::bind(
        nonblocking_tcp(AddressFamily::Ipv4),
        &SocketAddress::loopback(AddressFamily::Ipv4, 0),
    )
    .unwrap();
    let _listener = ConnectionEstablisher::listen(listener, 0).unwrap();

    // The accept queue holds a single connection; later handshakes stay pending.
    let mut queued = Vec::new();
    for _ in 0..2 {
        if let Ok(outcome) =
            ConnectionEstablisher::connect(nonblocking_tcp(AddressFamily::Ipv4), &bound, Timeout::from_millis(200))
        {
            queued.push(outcome.into_handle());
        }
    }
    assert!(!queued.is_empty());

    let started = Instant::now();
    let err = ConnectionEstablisher::connect(nonblocking_tcp(AddressFamily::Ipv4), &bound, Timeout::from_millis(50))
        .unwrap_err();
    assert_eq!(err, TransportError::ConnectTimeout);
    assert!(started.elapsed() < Duration::from_millis(200));
}

#[test]
fn test_accept_times_out_without_clients() {
    let listener = nonblocking_tcp(AddressFamily::Ipv4);
    let (listener, _) =
        ConnectionEstablisher::bind(listener, &SocketAddress::loopback(AddressFamily::Ipv4, 0)).unwrap();
    let listener = ConnectionEstablisher::listen(listener, 1).unwrap();

    assert_eq!(
        ConnectionEstablisher::accept(&listener, Timeout::Immediate).unwrap_err(),
        TransportError::Timeout
    );
    assert_eq!(
        ConnectionEstablisher::accept(&listener, Timeout::from_millis(20)).unwrap_err(),
        TransportError::Timeout
    );
}

#[test]
fn test_buffer_sizes_from_properties() {
    init_logger();
    let mut props = HashMap::new();
    props.insert(TCP_RCV_SIZE_KEY.to_string(), "65536".to_string());
    props.insert(TCP_SND_SIZE_KEY.to_string(), "65536".to_string());
    let config = TransportConfig::from_properties(&props);

    let handle = SocketHandle::create(SocketType::Stream, AddressFamily::Ipv4)
        .unwrap()
        .apply_tcp_buffer_sizes(&config, &LogWarningSink)
        .unwrap();
    assert!(handle.recv_buffer_size().unwrap() > 0);
    assert!(handle.send_buffer_size().unwrap() > 0);
}

#[test]
fn test_notification_pipe_wakes_reader() {
    let mut pipe = NotificationPipe::create().unwrap();
    pipe.write_end().write_all(&[1]).unwrap();
    let mut byte = [0u8; 1];
    pipe.read_end().read_exact(&mut byte).unwrap();
    assert_eq!(byte, [1]);
}

#[test]
fn test_wildcard_expansion() {
    init_logger();
    assert!(!AddressResolver::is_wildcard("", ProtocolSupport::Both));
    assert!(AddressResolver::is_wildcard("0.0.0.0", ProtocolSupport::Ipv4Only));
    let hosts = LocalInterfaces::hosts_for_wildcard_expansion("", ProtocolSupport::Both).unwrap();
    assert!(!hosts.is_empty());
    assert!(LocalInterfaces::hosts_for_wildcard_expansion("127.0.0.1", ProtocolSupport::Both)
        .unwrap()
        .is_empty());
}

#[test]
fn test_error_descriptions() {
    assert_eq!(ErrorCode::NONE.to_string(), "no corresponding system error");
    let err = TransportError::ConnectionRefused(ErrorCode::NONE);
    assert!(err.to_string().contains("no corresponding system error"));
    let _ = last_error_to_string();
}
