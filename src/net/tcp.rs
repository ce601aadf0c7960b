use std::io::{self, Read, Write};
use std::net::{self, IpAddr, Shutdown, SocketAddr};
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

use crate::handle::Handle;
use crate::sys::socket;

/// A non-blocking TCP stream, always ready for registration with an
/// `Engine`. Unlike `std::net::TcpStream::connect`, `connect` here never
/// blocks: the underlying `connect(2)` is started and `EINPROGRESS` is
/// treated as success, mirroring the source's `DoConnect`.
#[derive(Debug)]
pub struct TcpStream {
    inner: net::TcpStream,
}

/// A non-blocking TCP listener.
#[derive(Debug)]
pub struct TcpListener {
    inner: net::TcpListener,
}

impl TcpStream {
    /// Starts a non-blocking connect to `addr`, optionally binding the
    /// local side to `bind_addr` first.
    pub fn connect(addr: SocketAddr, bind_addr: Option<IpAddr>) -> io::Result<TcpStream> {
        let fd = socket::connect_nonblocking(addr, bind_addr)?;
        Ok(unsafe { TcpStream::from_raw_fd(fd) })
    }

    /// Wraps an already-connected, already-nonblocking descriptor (used by
    /// `Listener` when adopting an accepted connection).
    pub fn from_stream(stream: net::TcpStream) -> TcpStream {
        TcpStream { inner: stream }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.inner.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn try_clone(&self) -> io::Result<TcpStream> {
        self.inner.try_clone().map(|s| TcpStream { inner: s })
    }

    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        self.inner.shutdown(how)
    }

    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        self.inner.set_nodelay(nodelay)
    }

    pub fn nodelay(&self) -> io::Result<bool> {
        self.inner.nodelay()
    }

    pub fn set_ttl(&self, ttl: u32) -> io::Result<()> {
        self.inner.set_ttl(ttl)
    }

    pub fn ttl(&self) -> io::Result<u32> {
        self.inner.ttl()
    }

    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.inner.take_error()
    }

    /// Applies the source's fixed 32KiB send/receive buffer sizing.
    pub fn size_buffers(&self, bytes: i32) {
        socket::size_buffers(self.inner.as_raw_fd(), bytes);
    }

    pub fn handle(&self) -> Handle {
        Handle(self.inner.as_raw_fd())
    }
}

impl Read for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<'a> Read for &'a TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.inner).read(buf)
    }
}

impl Write for TcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<'a> Write for &'a TcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&self.inner).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&self.inner).flush()
    }
}

impl FromRawFd for TcpStream {
    unsafe fn from_raw_fd(fd: RawFd) -> TcpStream {
        TcpStream {
            inner: net::TcpStream::from_raw_fd(fd),
        }
    }
}

impl IntoRawFd for TcpStream {
    fn into_raw_fd(self) -> RawFd {
        self.inner.into_raw_fd()
    }
}

impl AsRawFd for TcpStream {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl TcpListener {
    /// Binds a non-blocking listener to `addr` with the given backlog.
    pub fn bind(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
        let fd = socket::listen_nonblocking(addr, backlog)?;
        Ok(unsafe { TcpListener::from_raw_fd(fd) })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn try_clone(&self) -> io::Result<TcpListener> {
        self.inner.try_clone().map(|s| TcpListener { inner: s })
    }

    /// Accepts one pending connection. Returns `WouldBlock` when none is
    /// pending, matching a non-blocking `accept(2)`.
    pub fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (fd, addr) = socket::accept_nonblocking(self.inner.as_raw_fd())?;
        Ok((unsafe { TcpStream::from_raw_fd(fd) }, addr))
    }

    pub fn set_ttl(&self, ttl: u32) -> io::Result<()> {
        self.inner.set_ttl(ttl)
    }

    pub fn ttl(&self) -> io::Result<u32> {
        self.inner.ttl()
    }

    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.inner.take_error()
    }

    pub fn handle(&self) -> Handle {
        Handle(self.inner.as_raw_fd())
    }
}

impl FromRawFd for TcpListener {
    unsafe fn from_raw_fd(fd: RawFd) -> TcpListener {
        TcpListener {
            inner: net::TcpListener::from_raw_fd(fd),
        }
    }
}

impl IntoRawFd for TcpListener {
    fn into_raw_fd(self) -> RawFd {
        self.inner.into_raw_fd()
    }
}

impl AsRawFd for TcpListener {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}
