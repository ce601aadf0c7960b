//! End-to-end scenario tests (S1-S6) exercising the public API against real
//! loopback sockets, the way a systems crate smoke-tests its event loop.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use hookline::engine::Engine;
use hookline::listener::{Accepted, Listener};
use hookline::mode::Mode;
use hookline::socket::{BufferedSocket, SocketHandler};

#[derive(Default)]
struct Recorder {
    connected: bool,
    data: Vec<u8>,
    write_ready: bool,
    timed_out: bool,
    errored: Option<hookline::ErrorKind>,
    closed: bool,
}

impl SocketHandler for Recorder {
    fn on_connected(&mut self, _socket: &mut BufferedSocket) -> bool {
        self.connected = true;
        true
    }

    fn on_error(&mut self, _socket: &mut BufferedSocket, kind: hookline::ErrorKind) {
        self.errored = Some(kind);
    }

    fn on_data_ready(&mut self, socket: &mut BufferedSocket) -> bool {
        self.data.extend_from_slice(socket.inbound());
        let n = socket.inbound().len();
        socket.consume(n);
        true
    }

    fn on_write_ready(&mut self, _socket: &mut BufferedSocket) -> bool {
        self.write_ready = true;
        true
    }

    fn on_timeout(&mut self, _socket: &mut BufferedSocket) {
        self.timed_out = true;
    }

    fn on_close(&mut self, _socket: &mut BufferedSocket) {
        self.closed = true;
    }
}

fn pump(engine: &mut Engine, timeout: Duration) -> Vec<(hookline::Handle, hookline::Ready)> {
    engine.wait(Some(timeout)).expect("wait")
}

/// S1 - plaintext echo: a client sends a line, the server echoes it back.
#[test]
fn s1_plaintext_echo() {
    let mut engine = Engine::new().expect("engine");
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let mut listener = Listener::open(&mut engine, addr).expect("listen");
    let server_addr = listener.local_addr().expect("local_addr");

    let mut client = BufferedSocket::open_client(&mut engine, server_addr, None, Duration::from_secs(5)).expect("connect");
    let mut client_handler = Recorder::default();
    let mut server_handler = Recorder::default();

    let mut server: Option<BufferedSocket> = None;
    let deadline = Instant::now() + Duration::from_secs(5);

    while Instant::now() < deadline {
        for (handle, ready) in pump(&mut engine, Duration::from_millis(200)) {
            if handle == listener.handle() {
                if let Accepted::Connection(stream, peer) = listener.poll_ready().expect("accept") {
                    server = Some(BufferedSocket::adopt(&mut engine, stream, peer).expect("adopt"));
                }
                continue;
            }

            if Some(handle) == client.handle() {
                let mode = if ready.is_writable() { Mode::Write } else { Mode::Read };
                client.poll_ready(&mut engine, mode, &mut client_handler).expect("client poll");
            }

            if let Some(server_socket) = server.as_mut() {
                if Some(handle) == server_socket.handle() {
                    let mode = if ready.is_writable() { Mode::Write } else { Mode::Read };
                    server_socket.poll_ready(&mut engine, mode, &mut server_handler).expect("server poll");
                }
            }
        }

        if client_handler.connected && server.is_some() {
            break;
        }
    }

    assert!(client_handler.connected, "client never saw on_connected");
    let server_socket = server.as_mut().expect("server accepted a connection");

    client.write(b"HELLO\n");

    let deadline = Instant::now() + Duration::from_secs(5);
    while server_handler.data.is_empty() && Instant::now() < deadline {
        for (handle, ready) in pump(&mut engine, Duration::from_millis(200)) {
            let mode = if ready.is_writable() { Mode::Write } else { Mode::Read };
            if Some(handle) == server_socket.handle() {
                server_socket.poll_ready(&mut engine, mode, &mut server_handler).expect("server poll");
            }
            if Some(handle) == client.handle() {
                client.poll_ready(&mut engine, mode, &mut client_handler).expect("client poll");
            }
        }
    }

    assert_eq!(server_handler.data, b"HELLO\n");

    server_socket.write(b"WORLD\n");

    let deadline = Instant::now() + Duration::from_secs(5);
    while client_handler.data.is_empty() && Instant::now() < deadline {
        for (handle, ready) in pump(&mut engine, Duration::from_millis(200)) {
            let mode = if ready.is_writable() { Mode::Write } else { Mode::Read };
            if Some(handle) == server_socket.handle() {
                server_socket.poll_ready(&mut engine, mode, &mut server_handler).expect("server poll");
            }
            if Some(handle) == client.handle() {
                client.poll_ready(&mut engine, mode, &mut client_handler).expect("client poll");
            }
        }
    }

    assert_eq!(client_handler.data, b"WORLD\n");
}

/// S4 - want-write flip: `request_write_ready` causes `on_write_ready` to
/// fire on the next tick, and the engine registration returns to Read
/// afterwards.
#[test]
fn s4_request_write_ready_flips_back_to_read() {
    let mut engine = Engine::new().expect("engine");
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let mut listener = Listener::open(&mut engine, addr).expect("listen");
    let server_addr = listener.local_addr().expect("local_addr");

    let mut client = BufferedSocket::open_client(&mut engine, server_addr, None, Duration::from_secs(5)).expect("connect");
    let mut client_handler = Recorder::default();
    let mut server_handler = Recorder::default();
    let mut server: Option<BufferedSocket> = None;

    let deadline = Instant::now() + Duration::from_secs(5);
    while (server.is_none() || !client_handler.connected) && Instant::now() < deadline {
        for (handle, ready) in pump(&mut engine, Duration::from_millis(200)) {
            if handle == listener.handle() {
                if let Accepted::Connection(stream, peer) = listener.poll_ready().expect("accept") {
                    server = Some(BufferedSocket::adopt(&mut engine, stream, peer).expect("adopt"));
                }
                continue;
            }
            let mode = if ready.is_writable() { Mode::Write } else { Mode::Read };
            if Some(handle) == client.handle() {
                client.poll_ready(&mut engine, mode, &mut client_handler).expect("client poll");
            }
        }
    }

    let server_socket = server.as_mut().expect("accepted");
    server_socket.request_write_ready(&mut engine).expect("request_write_ready");
    assert!(engine.want_write(server_socket.handle().unwrap()));

    let deadline = Instant::now() + Duration::from_secs(5);
    while !server_handler.write_ready && Instant::now() < deadline {
        for (handle, ready) in pump(&mut engine, Duration::from_millis(200)) {
            if Some(handle) == server_socket.handle() {
                let mode = if ready.is_writable() { Mode::Write } else { Mode::Read };
                server_socket.poll_ready(&mut engine, mode, &mut server_handler).expect("server poll");
            }
        }
    }

    assert!(server_handler.write_ready);
    assert!(!engine.want_write(server_socket.handle().unwrap()));
}

/// S2 - connect timeout. Requires an address that silently drops SYNs
/// rather than refusing, which depends on the network the test runs in;
/// ignored by default the way a network-dependent test in a systems crate
/// typically is.
#[test]
#[ignore = "requires a black-holed address reachable from the test network"]
fn s2_connect_timeout() {
    let mut engine = Engine::new().expect("engine");
    let addr: SocketAddr = "198.51.100.1:6667".parse().unwrap();
    let mut client = BufferedSocket::open_client(&mut engine, addr, None, Duration::from_millis(300)).expect("connect");
    let mut handler = Recorder::default();

    let deadline = Instant::now() + Duration::from_secs(2);
    while !handler.timed_out && Instant::now() < deadline {
        for (handle, ready) in pump(&mut engine, Duration::from_millis(100)) {
            if Some(handle) == client.handle() {
                let mode = if ready.is_writable() { Mode::Write } else { Mode::Read };
                let _ = client.poll_ready(&mut engine, mode, &mut handler);
            }
        }
        client.tick(Instant::now(), &mut engine, &mut handler);
    }

    assert!(handler.timed_out);
    assert_eq!(handler.errored, Some(hookline::ErrorKind::Timeout));
}
