use std::io;
use std::mem;
use std::net::{IpAddr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::unix::io::RawFd;

use libc::{self, c_int, c_void, socklen_t};

use crate::sys::syscall;

/// `setsockopt` for a fixed-size payload, mirroring the source's
/// `SetQueues` (`SO_SNDBUF`/`SO_RCVBUF` sizing applied to freshly accepted
/// sockets).
pub fn setsockopt<T>(fd: RawFd, level: c_int, opt: c_int, payload: T) -> io::Result<()> {
    let payload = &payload as *const T as *const c_void;
    syscall!(setsockopt(
        fd,
        level,
        opt,
        payload,
        mem::size_of::<T>() as socklen_t
    ))?;
    Ok(())
}

/// Applies the source's fixed 32KiB send/receive buffer sizing to a freshly
/// accepted descriptor. Best-effort: failures are not fatal, the kernel
/// default still works.
pub fn size_buffers(fd: RawFd, bytes: c_int) {
    let _ = setsockopt(fd, libc::SOL_SOCKET, libc::SO_SNDBUF, bytes);
    let _ = setsockopt(fd, libc::SOL_SOCKET, libc::SO_RCVBUF, bytes);
}

fn sockaddr_of(addr: &SocketAddr) -> (libc::sockaddr_storage, socklen_t) {
    unsafe {
        let mut storage: libc::sockaddr_storage = mem::zeroed();
        let len = match *addr {
            SocketAddr::V4(ref a) => {
                let raw = &mut storage as *mut _ as *mut libc::sockaddr_in;
                *raw = v4_to_raw(a);
                mem::size_of::<libc::sockaddr_in>()
            }
            SocketAddr::V6(ref a) => {
                let raw = &mut storage as *mut _ as *mut libc::sockaddr_in6;
                *raw = v6_to_raw(a);
                mem::size_of::<libc::sockaddr_in6>()
            }
        };
        (storage, len as socklen_t)
    }
}

fn v4_to_raw(addr: &SocketAddrV4) -> libc::sockaddr_in {
    let mut raw: libc::sockaddr_in = unsafe { mem::zeroed() };
    raw.sin_family = libc::AF_INET as libc::sa_family_t;
    raw.sin_port = addr.port().to_be();
    raw.sin_addr = libc::in_addr {
        s_addr: u32::from_ne_bytes(addr.ip().octets()),
    };
    raw
}

fn v6_to_raw(addr: &SocketAddrV6) -> libc::sockaddr_in6 {
    let mut raw: libc::sockaddr_in6 = unsafe { mem::zeroed() };
    raw.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    raw.sin6_port = addr.port().to_be();
    raw.sin6_addr = libc::in6_addr {
        s6_addr: addr.ip().octets(),
    };
    raw.sin6_flowinfo = addr.flowinfo();
    raw.sin6_scope_id = addr.scope_id();
    raw
}

/// Opens a non-blocking TCP socket and starts an asynchronous `connect(2)`,
/// optionally bound to `bind_addr` first.
///
/// Mirrors `InspSocket::DoConnect`: the descriptor is created, marked
/// non-blocking, optionally bound, and handed to `connect`. `EINPROGRESS` is
/// the expected outcome and is reported as success; the caller registers for
/// write-readiness and waits for the engine to say the connect finished.
pub fn connect_nonblocking(addr: SocketAddr, bind_addr: Option<IpAddr>) -> io::Result<RawFd> {
    let family = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };

    let fd = syscall!(socket(family, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0))?;

    if let Err(e) = configure_and_connect(fd, addr, bind_addr) {
        unsafe {
            libc::close(fd);
        }
        return Err(e);
    }

    Ok(fd)
}

fn configure_and_connect(fd: RawFd, addr: SocketAddr, bind_addr: Option<IpAddr>) -> io::Result<()> {
    let flags = syscall!(fcntl(fd, libc::F_GETFL, 0))?;
    syscall!(fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK))?;

    if let Some(ip) = bind_addr {
        let bind_sockaddr = SocketAddr::new(ip, 0);
        let (storage, len) = sockaddr_of(&bind_sockaddr);
        syscall!(bind(fd, &storage as *const _ as *const libc::sockaddr, len))?;
    }

    let (storage, len) = sockaddr_of(&addr);
    match syscall!(connect(fd, &storage as *const _ as *const libc::sockaddr, len)) {
        Ok(_) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Opens a non-blocking listening socket bound to `addr`.
pub fn listen_nonblocking(addr: SocketAddr, backlog: c_int) -> io::Result<RawFd> {
    let family = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };

    let fd = syscall!(socket(family, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0))?;

    if let Err(e) = bind_and_listen(fd, addr, backlog) {
        unsafe {
            libc::close(fd);
        }
        return Err(e);
    }

    Ok(fd)
}

fn bind_and_listen(fd: RawFd, addr: SocketAddr, backlog: c_int) -> io::Result<()> {
    let one: c_int = 1;
    setsockopt(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, one)?;

    let flags = syscall!(fcntl(fd, libc::F_GETFL, 0))?;
    syscall!(fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK))?;

    let (storage, len) = sockaddr_of(&addr);
    syscall!(bind(fd, &storage as *const _ as *const libc::sockaddr, len))?;
    syscall!(listen(fd, backlog))?;

    Ok(())
}

/// Accepts one pending connection from a non-blocking listener, returning
/// the child descriptor already marked non-blocking.
pub fn accept_nonblocking(listener_fd: RawFd) -> io::Result<(RawFd, SocketAddr)> {
    unsafe {
        let mut storage: libc::sockaddr_storage = mem::zeroed();
        let mut len = mem::size_of_val(&storage) as socklen_t;

        let fd = syscall!(accept4(
            listener_fd,
            &mut storage as *mut _ as *mut libc::sockaddr,
            &mut len,
            libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK
        ))?;

        let addr = addr_from_storage(&storage)?;
        Ok((fd, addr))
    }
}

unsafe fn addr_from_storage(storage: &libc::sockaddr_storage) -> io::Result<SocketAddr> {
    match storage.ss_family as c_int {
        libc::AF_INET => {
            let raw = &*(storage as *const _ as *const libc::sockaddr_in);
            let ip = std::net::Ipv4Addr::from(u32::from_ne_bytes(raw.sin_addr.s_addr.to_ne_bytes()));
            Ok(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(raw.sin_port))))
        }
        libc::AF_INET6 => {
            let raw = &*(storage as *const _ as *const libc::sockaddr_in6);
            let ip = std::net::Ipv6Addr::from(raw.sin6_addr.s6_addr);
            Ok(SocketAddr::V6(SocketAddrV6::new(
                ip,
                u16::from_be(raw.sin6_port),
                raw.sin6_flowinfo,
                raw.sin6_scope_id,
            )))
        }
        _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "unsupported address family")),
    }
}
