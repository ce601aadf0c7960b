use std::io;
use std::net::SocketAddr;

use log::{debug, warn};

use crate::engine::Engine;
use crate::handle::Handle;
use crate::mode::Mode;
use crate::net::tcp::TcpListener as RawListener;
use crate::net::tcp::TcpStream;

const ACCEPT_BACKLOG: i32 = 128;

/// A listening socket: a specialization of the buffered socket whose only
/// emission is a stream of accepted child connections. Registered for Read;
/// each readiness event drains one pending `accept(2)`.
pub struct Listener {
    inner: RawListener,
}

/// What the owner does with each accepted connection, returned from
/// `poll_ready`.
pub enum Accepted {
    /// Nothing was pending (a spurious wakeup, or edge-triggered coalescing).
    None,
    /// One connection was accepted; the owner is expected to call
    /// `BufferedSocket::adopt` with it.
    Connection(TcpStream, SocketAddr),
}

impl Listener {
    /// Binds and registers a non-blocking listener.
    pub fn open(engine: &mut Engine, addr: SocketAddr) -> io::Result<Listener> {
        let inner = RawListener::bind(addr, ACCEPT_BACKLOG)?;
        engine.register(inner.handle(), Mode::Read)?;

        debug!("listener: bound {}", addr);
        Ok(Listener { inner })
    }

    pub fn handle(&self) -> Handle {
        self.inner.handle()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Accepts one pending connection, if any. The caller adopts the
    /// returned stream into a `BufferedSocket` via `adopt`.
    pub fn poll_ready(&mut self) -> io::Result<Accepted> {
        match self.inner.accept() {
            Ok((stream, addr)) => {
                debug!("listener: accepted {}", addr);
                Ok(Accepted::Connection(stream, addr))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Accepted::None),
            Err(e) => {
                warn!("listener: accept failed: {}", e);
                Err(e)
            }
        }
    }

    /// Deregisters and drops the listening descriptor.
    pub fn close(self, engine: &mut Engine) {
        let _ = engine.deregister(self.inner.handle());
    }
}
