use std::fmt;
use std::os::unix::io::{AsRawFd, RawFd};

/// A descriptor handle: the small integer identifying an OS socket that the
/// readiness engine and `BufferedSocket` both key off.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub RawFd);

impl From<RawFd> for Handle {
    #[inline]
    fn from(fd: RawFd) -> Handle {
        Handle(fd)
    }
}

impl From<Handle> for RawFd {
    #[inline]
    fn from(handle: Handle) -> RawFd {
        handle.0
    }
}

impl<T: AsRawFd> From<&T> for Handle {
    #[inline]
    fn from(source: &T) -> Handle {
        Handle(source.as_raw_fd())
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "fd#{}", self.0)
    }
}
