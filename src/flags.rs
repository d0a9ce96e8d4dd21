//! Options passed to `waitpid(2)`.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Options for reaping a process, see [`waitpid(2)`].
///
/// Apart from [`NO_HANG`], which the wait engine adds or removes depending on
/// the timeout, the flags are passed to `waitpid(2)` as is.
///
/// [`waitpid(2)`]: https://man7.org/linux/man-pages/man2/waitpid.2.html
/// [`NO_HANG`]: WaitFlags::NO_HANG
///
/// # Examples
///
/// ```
/// use pwait::WaitFlags;
///
/// let flags = WaitFlags::empty() | WaitFlags::UNTRACED;
/// assert!(flags.contains(WaitFlags::UNTRACED));
/// assert!(!flags.contains(WaitFlags::NO_HANG));
/// ```
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct WaitFlags(libc::c_int);

impl WaitFlags {
    /// Return immediately if the process hasn't changed state (`WNOHANG`).
    pub const NO_HANG: WaitFlags = WaitFlags(libc::WNOHANG);
    /// Also report stopped processes (`WUNTRACED`).
    pub const UNTRACED: WaitFlags = WaitFlags(libc::WUNTRACED);
    /// Also report processes resumed by `SIGCONT` (`WCONTINUED`).
    pub const CONTINUED: WaitFlags = WaitFlags(libc::WCONTINUED);

    /// No flags set.
    pub const fn empty() -> WaitFlags {
        WaitFlags(0)
    }

    /// Create flags from the raw `waitpid(2)` options.
    pub const fn from_bits(bits: libc::c_int) -> WaitFlags {
        WaitFlags(bits)
    }

    /// Returns the raw `waitpid(2)` options.
    pub const fn bits(self) -> libc::c_int {
        self.0
    }

    /// Returns `true` if all flags in `other` are set in `self`.
    pub const fn contains(self, other: WaitFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the flags with `other` set.
    pub(crate) const fn with(self, other: WaitFlags) -> WaitFlags {
        WaitFlags(self.0 | other.0)
    }

    /// Returns the flags with `other` unset.
    pub(crate) const fn without(self, other: WaitFlags) -> WaitFlags {
        WaitFlags(self.0 & !other.0)
    }
}

impl BitOr for WaitFlags {
    type Output = WaitFlags;

    fn bitor(self, rhs: WaitFlags) -> WaitFlags {
        self.with(rhs)
    }
}

impl BitOrAssign for WaitFlags {
    fn bitor_assign(&mut self, rhs: WaitFlags) {
        *self = self.with(rhs);
    }
}

impl fmt::Debug for WaitFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(WaitFlags, &str); 3] = [
            (WaitFlags::NO_HANG, "WNOHANG"),
            (WaitFlags::UNTRACED, "WUNTRACED"),
            (WaitFlags::CONTINUED, "WCONTINUED"),
        ];

        let mut first = true;
        let mut rest = self.0;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                rest &= !flag.0;
                first = false;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{rest:#x}")?;
        } else if first {
            f.write_str("(empty)")?;
        }
        Ok(())
    }
}
