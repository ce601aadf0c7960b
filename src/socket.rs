use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::engine::Engine;
use crate::error::ErrorKind;
use crate::handle::Handle;
use crate::hook::{HookChain, ReadOutcome, WriteOutcome};
use crate::mode::Mode;
use crate::net::tcp::TcpStream;

const DEFAULT_INBOUND_CAPACITY: usize = 8192;
const SEND_BUFFER_BYTES: i32 = 32 * 1024;

/// Lifecycle state of a buffered socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// The owner's capability surface. Every method has a permissive default
/// so a consumer only overrides what it cares about.
#[allow(unused_variables)]
pub trait SocketHandler {
    fn on_connected(&mut self, socket: &mut BufferedSocket) -> bool {
        true
    }

    fn on_error(&mut self, socket: &mut BufferedSocket, kind: ErrorKind) {}

    fn on_disconnect(&mut self, socket: &mut BufferedSocket) {}

    fn on_data_ready(&mut self, socket: &mut BufferedSocket) -> bool {
        true
    }

    fn on_write_ready(&mut self, socket: &mut BufferedSocket) -> bool {
        true
    }

    fn on_timeout(&mut self, socket: &mut BufferedSocket) {}

    fn on_close(&mut self, socket: &mut BufferedSocket) {}
}

/// A single non-blocking TCP connection: lifecycle state, in-memory inbound
/// and outbound buffers, and the hook chain bytes pass through.
pub struct BufferedSocket {
    state: SocketState,
    stream: Option<TcpStream>,
    hooks: Option<HookChain>,
    peer_addr: Option<SocketAddr>,
    deadline: Option<Instant>,
    inbound: Vec<u8>,
    inbound_capacity: usize,
    outbound: VecDeque<Vec<u8>>,
    close_pending: bool,
    wants_write: bool,
}

impl BufferedSocket {
    /// Starts an outbound, non-blocking connect. Registers the new
    /// descriptor for write-readiness; the connect is
    /// reported complete when the engine delivers that event.
    pub fn open_client(
        engine: &mut Engine,
        addr: SocketAddr,
        bind_addr: Option<IpAddr>,
        timeout: Duration,
    ) -> io::Result<BufferedSocket> {
        let stream = TcpStream::connect(addr, bind_addr)?;
        let handle = stream.handle();

        engine.register(handle, Mode::Write)?;

        debug!("socket: connecting to {} ({})", addr, handle);

        Ok(BufferedSocket {
            state: SocketState::Connecting,
            stream: Some(stream),
            hooks: None,
            peer_addr: Some(addr),
            deadline: Some(Instant::now() + timeout),
            inbound: Vec::with_capacity(DEFAULT_INBOUND_CAPACITY),
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound: VecDeque::new(),
            close_pending: false,
            wants_write: false,
        })
    }

    /// Adopts an already-accepted descriptor as a live connection, applying
    /// the source's fixed socket-buffer sizing.
    pub fn adopt(engine: &mut Engine, stream: TcpStream, peer_addr: SocketAddr) -> io::Result<BufferedSocket> {
        stream.size_buffers(SEND_BUFFER_BYTES);
        let handle = stream.handle();
        engine.register(handle, Mode::Read)?;

        Ok(BufferedSocket {
            state: SocketState::Connected,
            stream: Some(stream),
            hooks: None,
            peer_addr: Some(peer_addr),
            deadline: None,
            inbound: Vec::with_capacity(DEFAULT_INBOUND_CAPACITY),
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound: VecDeque::new(),
            close_pending: false,
            wants_write: false,
        })
    }

    /// Installs the hook chain this connection will read/write through.
    /// Fixed for the life of the connection: no mid-flight reordering.
    pub fn install_hooks(&mut self, mut hooks: HookChain) {
        hooks.on_attach();
        self.hooks = Some(hooks);
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn handle(&self) -> Option<Handle> {
        self.stream.as_ref().map(|s| s.handle())
    }

    pub fn inbound(&self) -> &[u8] {
        &self.inbound
    }

    /// Clears `n` consumed bytes from the front of the inbound buffer.
    pub fn consume(&mut self, n: usize) {
        self.inbound.drain(..n.min(self.inbound.len()));
    }

    /// Queues `bytes` for transmission and attempts an immediate flush.
    /// Returns `false` if the socket is already close-pending.
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        if self.close_pending {
            return false;
        }

        self.outbound.push_back(bytes.to_vec());
        let _ = self.flush();
        true
    }

    /// Sets the wants-write flag and flips the engine registration to
    /// Write.
    pub fn request_write_ready(&mut self, engine: &mut Engine) -> io::Result<()> {
        self.wants_write = true;
        if let Some(handle) = self.handle() {
            engine.modify(handle, Mode::Write)?;
        }
        Ok(())
    }

    /// Marks the socket for teardown at the next tick. Idempotent: a second
    /// call is a no-op beyond re-asserting the flag.
    pub fn close<H: SocketHandler>(&mut self, engine: &mut Engine, handler: &mut H) {
        if self.close_pending && self.stream.is_none() {
            return;
        }

        self.close_pending = true;
        self.finalize(engine, handler);
    }

    fn finalize<H: SocketHandler>(&mut self, engine: &mut Engine, handler: &mut H) {
        if let Some(handle) = self.handle() {
            let _ = engine.deregister(handle);
        }

        if let Some(mut hooks) = self.hooks.take() {
            hooks.on_detach();
        }

        self.stream = None;
        self.state = SocketState::Error;
        handler.on_close(self);
    }

    fn fail<H: SocketHandler>(&mut self, engine: &mut Engine, handler: &mut H, kind: ErrorKind) {
        warn!("socket: {} ({:?})", kind, kind);
        self.close_pending = true;
        handler.on_error(self, kind);
        self.finalize(engine, handler);
    }

    /// Advances the state machine on a readiness event.
    pub fn poll_ready<H: SocketHandler>(&mut self, engine: &mut Engine, mode: Mode, handler: &mut H) -> io::Result<()> {
        match (self.state, mode) {
            (SocketState::Connecting, Mode::Write) => self.finish_connect(engine, handler),
            (SocketState::Connected, Mode::Read) => self.handle_read_ready(engine, handler),
            (SocketState::Connected, Mode::Write) => self.handle_write_ready(engine, handler),
            _ => Ok(()),
        }
    }

    fn finish_connect<H: SocketHandler>(&mut self, engine: &mut Engine, handler: &mut H) -> io::Result<()> {
        let stream = match &self.stream {
            Some(s) => s,
            None => return Ok(()),
        };

        match stream.take_error()? {
            Some(_) => {
                self.fail(engine, handler, ErrorKind::Connect);
                return Ok(());
            }
            None => {}
        }

        self.state = SocketState::Connected;
        self.deadline = None;
        if let Some(handle) = self.handle() {
            engine.modify(handle, Mode::Read)?;
        }

        debug!("socket: connected to {:?}", self.peer_addr);

        if !handler.on_connected(self) {
            self.close(engine, handler);
        }

        Ok(())
    }

    fn handle_read_ready<H: SocketHandler>(&mut self, engine: &mut Engine, handler: &mut H) -> io::Result<()> {
        let mut buf = vec![0u8; 4096];
        let outcome = self.read_through_hooks(&mut buf);

        match outcome {
            ReadOutcome::Data(n) => {
                if self.inbound.len() + n > self.inbound_capacity {
                    warn!("socket: inbound buffer capacity exceeded, closing");
                    self.fail(engine, handler, ErrorKind::Socket);
                    return Ok(());
                }

                self.inbound.extend_from_slice(&buf[..n]);
                trace!("socket: {} byte(s) ready", n);

                if !handler.on_data_ready(self) {
                    self.close(engine, handler);
                }

                self.flush_to_hooks(engine, handler);
            }
            ReadOutcome::WouldBlock => {
                if !self.outbound.is_empty() {
                    self.flush_to_hooks(engine, handler);
                }
            }
            ReadOutcome::Eof => {
                handler.on_disconnect(self);
                self.close(engine, handler);
            }
            ReadOutcome::Error(e) => {
                warn!("socket: read failed: {}", e);
                self.fail(engine, handler, ErrorKind::Socket);
            }
        }

        Ok(())
    }

    fn handle_write_ready<H: SocketHandler>(&mut self, engine: &mut Engine, handler: &mut H) -> io::Result<()> {
        if self.wants_write {
            self.wants_write = false;
            if let Some(handle) = self.handle() {
                engine.modify(handle, Mode::Read)?;
            }

            if !handler.on_write_ready(self) {
                self.close(engine, handler);
                return Ok(());
            }
        }

        self.flush_to_hooks(engine, handler);
        Ok(())
    }

    fn read_through_hooks(&mut self, buf: &mut [u8]) -> ReadOutcome {
        match (&mut self.hooks, &mut self.stream) {
            (Some(hooks), _) => hooks.read(buf),
            (None, Some(stream)) => raw_read(stream, buf),
            (None, None) => ReadOutcome::Error(io::Error::new(io::ErrorKind::NotConnected, "socket is closed")),
        }
    }

    /// Transmits the head of the outbound queue via the hook chain. A
    /// short write replaces the head with its unsent suffix; a fatal error
    /// marks the socket Error and close-pending.
    fn flush(&mut self) -> io::Result<()> {
        while let Some(chunk) = self.outbound.front() {
            let outcome = match (&mut self.hooks, &mut self.stream) {
                (Some(hooks), _) => hooks.write(chunk),
                (None, Some(stream)) => raw_write(stream, chunk),
                (None, None) => break,
            };

            match outcome {
                WriteOutcome::Wrote(n) if n == chunk.len() => {
                    self.outbound.pop_front();
                }
                WriteOutcome::Wrote(n) => {
                    let remainder = chunk[n..].to_vec();
                    *self.outbound.front_mut().unwrap() = remainder;
                    break;
                }
                WriteOutcome::WouldBlock => break,
                WriteOutcome::Error(e) => {
                    self.close_pending = true;
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn flush_to_hooks<H: SocketHandler>(&mut self, engine: &mut Engine, handler: &mut H) {
        if let Err(e) = self.flush() {
            warn!("socket: write failed: {}", e);
            self.fail(engine, handler, ErrorKind::Write);
            return;
        }

        let wants_hook_write = self.hooks.as_ref().map(|h| h.wants_write()).unwrap_or(false);
        if (!self.outbound.is_empty() || wants_hook_write) && !self.wants_write {
            if let Some(handle) = self.handle() {
                self.wants_write = true;
                let _ = engine.modify(handle, Mode::Write);
            }
        }
    }

    /// Enforces the connect deadline and opportunistically flushes. Only
    /// Connecting sockets are subject to the deadline.
    pub fn tick<H: SocketHandler>(&mut self, now: Instant, engine: &mut Engine, handler: &mut H) {
        if self.state == SocketState::Connecting {
            if let Some(deadline) = self.deadline {
                if now > deadline {
                    debug!("socket: connect timed out (now={:?}, deadline={:?})", now, deadline);
                    handler.on_timeout(self);
                    self.fail(engine, handler, ErrorKind::Timeout);
                    return;
                }
            }
        }

        if self.state == SocketState::Connected {
            self.flush_to_hooks(engine, handler);
        }
    }
}

fn raw_read(stream: &mut TcpStream, buf: &mut [u8]) -> ReadOutcome {
    use std::io::Read;
    match stream.read(buf) {
        Ok(0) => ReadOutcome::Eof,
        Ok(n) => ReadOutcome::Data(n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => ReadOutcome::WouldBlock,
        Err(e) => ReadOutcome::Error(e),
    }
}

fn raw_write(stream: &mut TcpStream, buf: &[u8]) -> WriteOutcome {
    use std::io::Write;
    match stream.write(buf) {
        Ok(n) => WriteOutcome::Wrote(n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => WriteOutcome::WouldBlock,
        Err(e) => WriteOutcome::Error(e),
    }
}

impl AsRawFd for BufferedSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_ref().map(|s| s.as_raw_fd()).unwrap_or(-1)
    }
}
