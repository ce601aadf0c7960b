use std::error::Error as StdError;
use std::fmt;

/// The coarse failure taxonomy surfaced through `on_error`.
///
/// This is deliberately coarser than `std::io::Error`: the owner callback
/// only ever needs to know *which kind* of thing went wrong, not the raw
/// `errno`. The raw error, when one exists, is still returned from the
/// fallible setup call (`open_client`, `open_listener`) as an `io::Error`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// `socket(2)` itself failed.
    Socket,
    /// `bind(2)` failed.
    Bind,
    /// `connect(2)` failed for a reason other than `EINPROGRESS`.
    Connect,
    /// A write to the descriptor failed for a reason other than "would block".
    Write,
    /// The caller supplied a hostname instead of a literal address; the core
    /// does not resolve names.
    Resolve,
    /// A `Connecting` socket's deadline elapsed before the connect finished.
    Timeout,
    /// The engine has no room left to track another descriptor.
    Nomoresockets,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            ErrorKind::Socket => "socket creation failed",
            ErrorKind::Bind => "bind failed",
            ErrorKind::Connect => "connect failed",
            ErrorKind::Write => "write failed",
            ErrorKind::Resolve => "hostname resolution required but not supported",
            ErrorKind::Timeout => "connect timed out",
            ErrorKind::Nomoresockets => "no more descriptor slots available",
        };
        f.write_str(text)
    }
}

impl StdError for ErrorKind {}
