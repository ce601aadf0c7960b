//! The I/O hook chain: an ordered stack of interceptors between a buffered
//! socket's buffers and the raw descriptor. The archetypal hook is
//! [`crate::tls::TlsHook`]; `RawHook` is the fixed innermost link every
//! chain ends in.

mod chain;
mod raw;

pub use chain::HookChain;
pub use raw::RawHook;

use std::io;

/// Result of a hook's `read`. Distinguishes "nothing yet" from "the peer is
/// gone" from "something broke".
#[derive(Debug)]
pub enum ReadOutcome {
    Data(usize),
    WouldBlock,
    Eof,
    Error(io::Error),
}

/// Result of a hook's `write`. A short count is not an error: the caller
/// retains the unwritten residue.
#[derive(Debug)]
pub enum WriteOutcome {
    Wrote(usize),
    WouldBlock,
    Error(io::Error),
}

/// The remainder of the chain below the hook currently running. A hook
/// calls through `next` instead of holding a reference to its neighbour
/// directly, so the chain can be driven without self-referential structures.
pub trait Next {
    fn read(&mut self, dst: &mut [u8]) -> ReadOutcome;
    fn write(&mut self, src: &[u8]) -> WriteOutcome;
}

/// One interceptor in the stack. Implementors decide whether and how to
/// call `next`; `RawHook`, the fixed innermost link, ignores it.
pub trait Hook: std::fmt::Debug {
    /// Called once when the hook is installed on a connection.
    fn on_attach(&mut self) {}

    /// Called once at close. Must be idempotent.
    fn on_detach(&mut self) {}

    fn read(&mut self, next: &mut dyn Next, dst: &mut [u8]) -> ReadOutcome;

    fn write(&mut self, next: &mut dyn Next, src: &[u8]) -> WriteOutcome;

    /// Gate for application-level events that must wait for a handshake
    /// (e.g. TLS) to complete. Hooks with no handshake are always done.
    fn handshake_done(&self) -> bool {
        true
    }

    /// True if this hook currently needs write-readiness on the underlying
    /// descriptor to make progress, independent of whatever the outbound
    /// queue looks like (the TLS hook's want-mode cross product). Hooks
    /// with no such requirement (e.g. `RawHook`) leave this `false`.
    fn wants_write(&self) -> bool {
        false
    }
}
