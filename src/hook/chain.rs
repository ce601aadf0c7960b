use std::io;

use super::{Hook, Next, ReadOutcome, WriteOutcome};

/// An ordered, fixed stack of hooks: index 0 is outermost (application-
/// facing), the last entry is the innermost (conventionally a `RawHook`).
/// The owning buffered socket only ever calls into index 0; `Cursor`
/// threads each hook's call to the remainder of the stack.
pub struct HookChain {
    hooks: Vec<Box<dyn Hook>>,
}

struct Cursor<'a> {
    hooks: &'a mut [Box<dyn Hook>],
}

impl<'a> Next for Cursor<'a> {
    fn read(&mut self, dst: &mut [u8]) -> ReadOutcome {
        match self.hooks.split_first_mut() {
            None => ReadOutcome::Error(exhausted()),
            Some((head, rest)) => {
                let mut cursor = Cursor { hooks: rest };
                head.read(&mut cursor, dst)
            }
        }
    }

    fn write(&mut self, src: &[u8]) -> WriteOutcome {
        match self.hooks.split_first_mut() {
            None => WriteOutcome::Error(exhausted()),
            Some((head, rest)) => {
                let mut cursor = Cursor { hooks: rest };
                head.write(&mut cursor, src)
            }
        }
    }
}

fn exhausted() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "hook chain exhausted without a raw hook")
}

impl HookChain {
    /// Builds a chain from `hooks`, outer first. Panics if empty: a chain
    /// with no innermost raw hook can never touch the descriptor.
    pub fn new(hooks: Vec<Box<dyn Hook>>) -> HookChain {
        assert!(!hooks.is_empty(), "hook chain must have at least a raw hook");
        HookChain { hooks }
    }

    pub fn on_attach(&mut self) {
        for hook in self.hooks.iter_mut() {
            hook.on_attach();
        }
    }

    /// Idempotent: detaches every hook in reverse (innermost first).
    pub fn on_detach(&mut self) {
        for hook in self.hooks.iter_mut().rev() {
            hook.on_detach();
        }
    }

    pub fn read(&mut self, dst: &mut [u8]) -> ReadOutcome {
        let mut cursor = Cursor { hooks: &mut self.hooks };
        cursor.read(dst)
    }

    pub fn write(&mut self, src: &[u8]) -> WriteOutcome {
        let mut cursor = Cursor { hooks: &mut self.hooks };
        cursor.write(src)
    }

    /// True once every hook in the stack reports its handshake complete
    /// (a chain with no handshaking hooks is trivially done).
    pub fn handshake_done(&self) -> bool {
        self.hooks.iter().all(|h| h.handshake_done())
    }

    /// Union of every hook's `wants_write`: want-mode flipping needs
    /// whichever hook in the stack is currently blocked on it.
    pub fn wants_write(&self) -> bool {
        self.hooks.iter().any(|h| h.wants_write())
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("HookChain").field("depth", &self.hooks.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::RawHook;

    #[derive(Debug, Default)]
    struct CountingHook {
        attached: bool,
        detached: bool,
    }

    impl Hook for CountingHook {
        fn on_attach(&mut self) {
            self.attached = true;
        }

        fn on_detach(&mut self) {
            self.detached = true;
        }

        fn read(&mut self, next: &mut dyn Next, dst: &mut [u8]) -> ReadOutcome {
            next.read(dst)
        }

        fn write(&mut self, next: &mut dyn Next, src: &[u8]) -> WriteOutcome {
            next.write(src)
        }
    }

    #[test]
    fn single_raw_hook_reads_from_real_fd() {
        let mut fds = [0; 2];
        unsafe {
            assert_eq!(
                libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_NONBLOCK, 0, fds.as_mut_ptr()),
                0
            );
            libc::write(fds[1], b"hi".as_ptr() as *const libc::c_void, 2);
        }

        let mut chain = HookChain::new(vec![Box::new(RawHook::new(fds[0]))]);
        let mut buf = [0u8; 8];
        match chain.read(&mut buf) {
            ReadOutcome::Data(n) => assert_eq!(&buf[..n], b"hi"),
            other => panic!("unexpected outcome: {:?}", other),
        }

        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    #[test]
    fn stacking_calls_outer_before_inner() {
        let mut fds = [0; 2];
        unsafe {
            assert_eq!(
                libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_NONBLOCK, 0, fds.as_mut_ptr()),
                0
            );
        }

        let mut chain = HookChain::new(vec![Box::new(CountingHook::default()), Box::new(RawHook::new(fds[0]))]);
        chain.on_attach();

        let res = chain.write(b"out");
        assert!(matches!(res, WriteOutcome::Wrote(_) | WriteOutcome::WouldBlock));

        chain.on_detach();

        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }
}
