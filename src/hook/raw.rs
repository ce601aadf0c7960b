use std::io;
use std::os::unix::io::RawFd;

use super::{Hook, Next, ReadOutcome, WriteOutcome};

/// The fixed innermost link of every hook chain: performs the actual
/// `read(2)`/`write(2)` against the socket descriptor. Ignores `next`,
/// since there is nothing further down.
#[derive(Debug)]
pub struct RawHook {
    fd: RawFd,
}

impl RawHook {
    pub fn new(fd: RawFd) -> RawHook {
        RawHook { fd }
    }
}

impl Hook for RawHook {
    fn read(&mut self, _next: &mut dyn Next, dst: &mut [u8]) -> ReadOutcome {
        let rc = unsafe { libc::read(self.fd, dst.as_mut_ptr() as *mut libc::c_void, dst.len()) };

        match rc {
            0 => ReadOutcome::Eof,
            n if n > 0 => ReadOutcome::Data(n as usize),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    ReadOutcome::WouldBlock
                } else {
                    ReadOutcome::Error(err)
                }
            }
        }
    }

    fn write(&mut self, _next: &mut dyn Next, src: &[u8]) -> WriteOutcome {
        let rc = unsafe { libc::write(self.fd, src.as_ptr() as *const libc::c_void, src.len()) };

        if rc >= 0 {
            WriteOutcome::Wrote(rc as usize)
        } else {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                WriteOutcome::WouldBlock
            } else {
                WriteOutcome::Error(err)
            }
        }
    }
}
