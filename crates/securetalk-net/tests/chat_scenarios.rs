//! End-to-end scenarios driven over real loopback TCP sockets, mirroring
//! the reactor's actual wire behavior rather than its internals.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use securetalk_net::{decode, encode, DecodeOutcome, Server};

const ECHO: u16 = 0x0007;
const DELAYED_ECHO: u16 = 0x0010;

fn echo_handler() -> securetalk_net::Handler {
    Arc::new(|client_id, body| (client_id, ECHO, body))
}

fn delayed_echo_handler() -> securetalk_net::Handler {
    Arc::new(|client_id, body| {
        thread::sleep(Duration::from_millis(200));
        (client_id, DELAYED_ECHO, body)
    })
}

fn connect_retrying(port: u16) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)) {
            return stream;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("could not connect to 127.0.0.1:{port}");
}

fn read_one_frame(stream: &mut TcpStream) -> (u16, Vec<u8>) {
    let mut buf = Vec::new();
    let mut scratch = [0u8; 4096];
    loop {
        match decode(&mut buf, securetalk_net::DEFAULT_MAX_BODY_SIZE) {
            DecodeOutcome::Ready { msg_type, body } => return (msg_type, body),
            DecodeOutcome::Incomplete => {
                let n = stream.read(&mut scratch).expect("read");
                assert!(n > 0, "connection closed before a full frame arrived");
                buf.extend_from_slice(&scratch[..n]);
            }
            DecodeOutcome::Malformed => panic!("malformed frame from server"),
        }
    }
}

fn run_server_with(port: u16, register: impl FnOnce(&mut Server)) -> securetalk_net::ShutdownHandle {
    let mut server = Server::new();
    server.set_port(u32::from(port)).unwrap();
    server.set_max_worker_threads(4);
    register(&mut server);
    let handle = server.shutdown_handle();
    thread::spawn(move || server.start(u32::from(port)).unwrap());
    handle
}

#[test]
fn echo_under_fragmentation() {
    let port = 24_801;
    let handle = run_server_with(port, |s| s.register(ECHO, echo_handler()));

    let mut stream = connect_retrying(port);
    let frame = encode(ECHO, b"ping");
    stream.write_all(&frame[..3]).unwrap();
    thread::sleep(Duration::from_millis(20));
    stream.write_all(&frame[3..]).unwrap();

    let (msg_type, body) = read_one_frame(&mut stream);
    assert_eq!(msg_type, ECHO);
    assert_eq!(body, b"ping");

    handle.shutdown();
}

#[test]
fn unknown_type_is_tolerated() {
    let port = 24_802;
    let handle = run_server_with(port, |s| s.register(ECHO, echo_handler()));

    let mut stream = connect_retrying(port);
    stream.write_all(&encode(0xFFFF, b"")).unwrap();
    stream.write_all(&encode(ECHO, b"still here")).unwrap();

    let (msg_type, body) = read_one_frame(&mut stream);
    assert_eq!(msg_type, ECHO);
    assert_eq!(body, b"still here");

    handle.shutdown();
}

#[test]
fn oversized_frame_closes_connection_others_unaffected() {
    let port = 24_803;
    let handle = run_server_with(port, |s| s.register(ECHO, echo_handler()));

    let mut bad = connect_retrying(port);
    bad.write_all(&[0x00, 0x07, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();

    let mut scratch = [0u8; 16];
    loop {
        match bad.read(&mut scratch) {
            Ok(0) => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }

    let mut good = connect_retrying(port);
    good.write_all(&encode(ECHO, b"ok")).unwrap();
    let (msg_type, body) = read_one_frame(&mut good);
    assert_eq!(msg_type, ECHO);
    assert_eq!(body, b"ok");

    handle.shutdown();
}

#[test]
fn reply_after_disconnect_is_silently_dropped() {
    let port = 24_804;
    let handle = run_server_with(port, |s| s.register(DELAYED_ECHO, delayed_echo_handler()));

    {
        let mut stream = connect_retrying(port);
        stream.write_all(&encode(DELAYED_ECHO, b"gone")).unwrap();
    } // socket dropped immediately; handler's reply has nowhere to land

    thread::sleep(Duration::from_millis(400));

    // server is still healthy: a fresh connection still gets served
    let mut probe = connect_retrying(port);
    probe.write_all(&encode(DELAYED_ECHO, b"still healthy")).unwrap();
    let (msg_type, body) = read_one_frame(&mut probe);
    assert_eq!(msg_type, DELAYED_ECHO);
    assert_eq!(body, b"still healthy");

    handle.shutdown();
}

#[test]
fn many_concurrent_clients_each_see_in_order_echoes() {
    let port = 24_805;
    let handle = run_server_with(port, |s| s.register(ECHO, echo_handler()));

    let clients: Vec<_> = (0..100)
        .map(|_| {
            thread::spawn(move || {
                let mut stream = connect_retrying(port);
                for i in 0..100 {
                    let body = format!("{i:03}");
                    stream.write_all(&encode(ECHO, body.as_bytes())).unwrap();
                }
                for i in 0..100 {
                    let (msg_type, body) = read_one_frame(&mut stream);
                    assert_eq!(msg_type, ECHO);
                    assert_eq!(body, format!("{i:03}").into_bytes());
                }
            })
        })
        .collect();

    for client in clients {
        client.join().unwrap();
    }

    handle.shutdown();
}

#[test]
fn graceful_shutdown_closes_live_connections() {
    let port = 24_806;
    let handle = run_server_with(port, |s| s.register(ECHO, echo_handler()));

    let mut streams: Vec<_> = (0..10).map(|_| connect_retrying(port)).collect();
    for stream in &mut streams {
        stream.write_all(&encode(ECHO, b"hi")).unwrap();
        let (msg_type, body) = read_one_frame(stream);
        assert_eq!(msg_type, ECHO);
        assert_eq!(body, b"hi");
    }

    handle.shutdown();

    for stream in &mut streams {
        let mut scratch = [0u8; 16];
        let n = stream.read(&mut scratch).unwrap_or(0);
        assert_eq!(n, 0, "expected socket closed after shutdown");
    }
}
