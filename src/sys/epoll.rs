use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use std::cmp;

use libc::{self, c_int};
use libc::{EPOLLERR, EPOLLET, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLPRI, EPOLLRDHUP};

use crate::mode::Mode;
use crate::ready::Ready;
use crate::sys::syscall;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Thin wrapper over a single `epoll` instance.
///
/// This is the only place raw `epoll_ctl`/`epoll_wait` calls happen; `Engine`
/// builds the one-mode-per-handle contract on top of it.
pub struct Epoll {
    id: usize,
    epfd: RawFd,
}

impl Epoll {
    pub fn new() -> io::Result<Epoll> {
        let epfd = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed) + 1;

        Ok(Epoll { id, epfd })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        let timeout = timeout
            .map(|to| cmp::min(to.as_millis(), libc::c_int::MAX as u128) as libc::c_int)
            .unwrap_or(-1);

        let cnt = syscall!(epoll_wait(
            self.epfd,
            events.events.as_mut_ptr(),
            events.events.capacity() as i32,
            timeout
        ))?;

        unsafe { events.events.set_len(cnt as usize) };

        Ok(())
    }

    pub fn add(&self, fd: RawFd, token: usize, mode: Mode) -> io::Result<()> {
        let mut info = libc::epoll_event {
            events: mode_to_epoll(mode),
            u64: token as u64,
        };

        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut info))?;

        Ok(())
    }

    pub fn modify(&self, fd: RawFd, token: usize, mode: Mode) -> io::Result<()> {
        let mut info = libc::epoll_event {
            events: mode_to_epoll(mode),
            u64: token as u64,
        };

        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_MOD, fd, &mut info))?;

        Ok(())
    }

    pub fn delete(&self, fd: RawFd) -> io::Result<()> {
        let mut info = libc::epoll_event { events: 0, u64: 0 };

        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, &mut info))?;

        Ok(())
    }
}

fn mode_to_epoll(mode: Mode) -> u32 {
    let base = match mode {
        Mode::Read => EPOLLIN | EPOLLRDHUP,
        Mode::Write => EPOLLOUT,
    };

    (base | EPOLLET) as u32
}

impl AsRawFd for Epoll {
    fn as_raw_fd(&self) -> RawFd {
        self.epfd
    }
}

impl std::fmt::Debug for Epoll {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "Epoll {{ id: {}, fd: {} }}", self.id, self.epfd)
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::close(self.epfd);
        }
    }
}

pub struct Events {
    events: Vec<libc::epoll_event>,
}

impl Events {
    pub fn with_capacity(n: usize) -> Events {
        Events {
            events: Vec::with_capacity(n),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns `(token, readiness)` for the event at `idx`.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<(usize, Ready)> {
        self.events.get(idx).map(|event| {
            let epoll = event.events as c_int;
            let mut ready = Ready::empty();

            if (epoll & EPOLLIN) != 0 || (epoll & EPOLLPRI) != 0 {
                ready.insert(Ready::readable());
            }

            if (epoll & EPOLLOUT) != 0 {
                ready.insert(Ready::writable());
            }

            if (epoll & EPOLLERR) != 0 {
                ready.insert(Ready::error());
            }

            if (epoll & EPOLLRDHUP) != 0 || (epoll & EPOLLHUP) != 0 {
                ready.insert(Ready::hup());
            }

            (event.u64 as usize, ready)
        })
    }
}
