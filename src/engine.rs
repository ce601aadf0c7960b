use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::handle::Handle;
use crate::mode::Mode;
use crate::ready::Ready;
use crate::sys::epoll::{Epoll, Events};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// The readiness engine: a uniform `register`/`modify`/
/// `deregister`/`wait` surface over the platform's readiness primitive.
///
/// Enforces a one-mode-per-handle rule: a handle is registered under
/// exactly one of `{Read, Write}` at a time. Observing the other direction
/// means flipping the mode with `modify`.
pub struct Engine {
    epoll: Epoll,
    modes: IndexMap<RawFd, Mode>,
    events: Events,
}

impl Engine {
    pub fn new() -> io::Result<Engine> {
        Ok(Engine {
            epoll: Epoll::new()?,
            modes: IndexMap::new(),
            events: Events::with_capacity(DEFAULT_EVENT_CAPACITY),
        })
    }

    /// Registers `handle` for `mode`. Fails with `AlreadyExists` if the
    /// handle is already tracked.
    pub fn register(&mut self, handle: Handle, mode: Mode) -> io::Result<()> {
        if self.modes.contains_key(&handle.0) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already registered", handle),
            ));
        }

        self.epoll.add(handle.0, handle.0 as usize, mode)?;
        self.modes.insert(handle.0, mode);
        trace!("engine: registered {} for {:?}", handle, mode);
        Ok(())
    }

    /// Flips `handle`'s registration to `mode`. Equivalent to a
    /// `deregister` followed by a `register` on platforms without an atomic
    /// modify; here it is one `epoll_ctl(EPOLL_CTL_MOD)` call.
    pub fn modify(&mut self, handle: Handle, mode: Mode) -> io::Result<()> {
        self.epoll.modify(handle.0, handle.0 as usize, mode)?;
        self.modes.insert(handle.0, mode);
        trace!("engine: modified {} to {:?}", handle, mode);
        Ok(())
    }

    /// Removes `handle` from the engine. Idempotent: silently does nothing
    /// for a handle that is not registered, which close-path callers rely
    /// on to stay idempotent themselves.
    pub fn deregister(&mut self, handle: Handle) -> io::Result<()> {
        if self.modes.swap_remove(&handle.0).is_none() {
            return Ok(());
        }

        match self.epoll.delete(handle.0) {
            Ok(()) => {
                trace!("engine: deregistered {}", handle);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// True if `handle` currently has a live registration.
    pub fn has_fd(&self, handle: Handle) -> bool {
        self.modes.contains_key(&handle.0)
    }

    /// True if `handle`'s current registration is `Write`.
    pub fn want_write(&self, handle: Handle) -> bool {
        self.modes.get(&handle.0) == Some(&Mode::Write)
    }

    /// Blocks up to `timeout` for readiness events. `None` blocks
    /// indefinitely; `Some(Duration::ZERO)` polls without blocking. The
    /// returned vector may be empty (a spurious wakeup, or the timeout
    /// elapsing with nothing ready).
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<Vec<(Handle, Ready)>> {
        self.epoll.wait(&mut self.events, timeout)?;

        let mut ready = Vec::with_capacity(self.events.len());
        for idx in 0..self.events.len() {
            if let Some((token, mode_ready)) = self.events.get(idx) {
                ready.push((Handle(token as RawFd), mode_ready));
            }
        }

        if !ready.is_empty() {
            debug!("engine: wait() returned {} event(s)", ready.len());
        }

        Ok(ready)
    }

    pub fn registered_count(&self) -> usize {
        self.modes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::FromRawFd;

    fn socketpair() -> (RawFd, RawFd) {
        let mut fds = [0 as RawFd; 2];
        let rc = unsafe {
            libc::socketpair(
                libc::AF_UNIX,
                libc::SOCK_STREAM | libc::SOCK_NONBLOCK,
                0,
                fds.as_mut_ptr(),
            )
        };
        assert_eq!(rc, 0);
        (fds[0], fds[1])
    }

    #[test]
    fn register_then_wait_sees_readable() {
        let (a, b) = socketpair();
        let mut engine = Engine::new().unwrap();

        engine.register(Handle(a), Mode::Read).unwrap();
        assert!(engine.has_fd(Handle(a)));
        assert!(!engine.want_write(Handle(a)));

        unsafe {
            let mut stream = std::net::TcpStream::from_raw_fd(b);
            use std::io::Write;
            let _ = stream.write_all(b"x");
            std::mem::forget(stream); // keep `b` alive for the duration of the test
        }

        let events = engine.wait(Some(Duration::from_millis(500))).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Handle(a));
        assert!(events[0].1.is_readable());

        engine.deregister(Handle(a)).unwrap();
        assert!(!engine.has_fd(Handle(a)));

        unsafe {
            libc::close(a);
            libc::close(b);
        }
    }

    #[test]
    fn register_twice_fails() {
        let (a, b) = socketpair();
        let mut engine = Engine::new().unwrap();

        engine.register(Handle(a), Mode::Read).unwrap();
        assert!(engine.register(Handle(a), Mode::Read).is_err());

        unsafe {
            libc::close(a);
            libc::close(b);
        }
    }

    #[test]
    fn deregister_is_idempotent() {
        let (a, b) = socketpair();
        let mut engine = Engine::new().unwrap();

        engine.register(Handle(a), Mode::Read).unwrap();
        engine.deregister(Handle(a)).unwrap();
        engine.deregister(Handle(a)).unwrap();

        unsafe {
            libc::close(a);
            libc::close(b);
        }
    }

    #[test]
    fn modify_flips_mode() {
        let (a, b) = socketpair();
        let mut engine = Engine::new().unwrap();

        engine.register(Handle(a), Mode::Read).unwrap();
        assert!(!engine.want_write(Handle(a)));

        engine.modify(Handle(a), Mode::Write).unwrap();
        assert!(engine.want_write(Handle(a)));

        unsafe {
            libc::close(a);
            libc::close(b);
        }
    }
}
