use std::io::{self, Read, Write};
use std::os::unix::io::RawFd;

use crate::sys::syscall;

/// A non-owning view of a raw descriptor usable as the transport inside an
/// `openssl::ssl::SslStream`. Unlike `std::net::TcpStream::from_raw_fd`,
/// dropping this does not close the descriptor: the descriptor's lifetime is
/// owned by the buffered socket, not by the TLS hook layered on top of it.
#[derive(Debug)]
pub(super) struct RawIo(pub(super) RawFd);

impl Read for RawIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = syscall!(read(self.0, buf.as_mut_ptr() as *mut libc::c_void, buf.len()))?;
        Ok(n as usize)
    }
}

impl Write for RawIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = syscall!(write(self.0, buf.as_ptr() as *const libc::c_void, buf.len()))?;
        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
