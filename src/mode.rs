/// Which readiness a handle is currently registered for.
///
/// The engine enforces a one-mode-per-handle rule: a handle is registered
/// under exactly one of these at a time. Observing both directions on one
/// descriptor means flipping the mode with `modify`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

impl Mode {
    #[inline]
    pub fn is_read(self) -> bool {
        matches!(self, Mode::Read)
    }

    #[inline]
    pub fn is_write(self) -> bool {
        matches!(self, Mode::Write)
    }
}
