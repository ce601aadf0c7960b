use std::{fmt, ops};

/// A set of readiness events returned by the engine's `wait`.
///
/// Only readable and writable readiness are guaranteed by every backend;
/// `error` and `hup` are hints layered on top so `BufferedSocket` can collapse
/// a hangup straight into a read of zero instead of waiting for `recv` to say
/// so.
#[derive(Copy, PartialEq, Eq, Clone, PartialOrd, Ord)]
pub struct Ready(usize);

const READABLE: usize = 0b0001;
const WRITABLE: usize = 0b0010;
const ERROR: usize = 0b0100;
const HUP: usize = 0b1000;

impl Ready {
    pub fn empty() -> Ready {
        Ready(0)
    }

    #[inline]
    pub fn readable() -> Ready {
        Ready(READABLE)
    }

    #[inline]
    pub fn writable() -> Ready {
        Ready(WRITABLE)
    }

    #[inline]
    pub fn error() -> Ready {
        Ready(ERROR)
    }

    #[inline]
    pub fn hup() -> Ready {
        Ready(HUP)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Ready::empty()
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.contains(Ready::readable())
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.contains(Ready::writable())
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.contains(Ready::error())
    }

    #[inline]
    pub fn is_hup(&self) -> bool {
        self.contains(Ready::hup())
    }

    #[inline]
    pub fn contains<T: Into<Self>>(&self, other: T) -> bool {
        let other = other.into();
        (*self & other) == other
    }

    #[inline]
    pub fn insert<T: Into<Self>>(&mut self, other: T) {
        self.0 |= other.into().0;
    }

    #[inline]
    pub fn remove<T: Into<Self>>(&mut self, other: T) {
        self.0 &= !other.into().0;
    }
}

impl<T: Into<Ready>> ops::BitOr<T> for Ready {
    type Output = Ready;

    #[inline]
    fn bitor(self, other: T) -> Ready {
        Ready(self.0 | other.into().0)
    }
}

impl<T: Into<Ready>> ops::BitAnd<T> for Ready {
    type Output = Ready;

    #[inline]
    fn bitand(self, other: T) -> Ready {
        Ready(self.0 & other.into().0)
    }
}

impl fmt::Debug for Ready {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut one = false;
        let flags = [
            (READABLE, "Readable"),
            (WRITABLE, "Writable"),
            (ERROR, "Error"),
            (HUP, "Hup"),
        ];

        write!(fmt, "Ready {{")?;

        for &(flag, name) in &flags {
            if self.0 & flag != 0 {
                if one {
                    write!(fmt, " | ")?
                }
                write!(fmt, "{}", name)?;
                one = true
            }
        }

        write!(fmt, "}}")
    }
}
