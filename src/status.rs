//! Decoding of `waitpid(2)` statuses.

use std::fmt;

/// Outcome of waiting on a process.
///
/// Errors are not part of the outcome, they're returned as `Err(io::Error)`
/// by [`Wait::wait`], with the OS error code available via
/// [`io::Error::raw_os_error`].
///
/// [`Wait::wait`]: crate::Wait::wait
/// [`io::Error::raw_os_error`]: std::io::Error::raw_os_error
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Outcome {
    /// The process ran to completion with the exit code.
    Exited(u8),
    /// The process was terminated by the signal (number).
    Signaled(libc::c_int),
    /// The deadline passed before the process exited. The process is likely
    /// still running and has not been reaped.
    TimedOut,
}

impl Outcome {
    /// Returns the exit code, if the process exited normally.
    pub const fn code(self) -> Option<u8> {
        match self {
            Outcome::Exited(code) => Some(code),
            Outcome::Signaled(_) | Outcome::TimedOut => None,
        }
    }

    /// Returns the signal that terminated the process, if any.
    pub const fn signal(self) -> Option<libc::c_int> {
        match self {
            Outcome::Signaled(signal) => Some(signal),
            Outcome::Exited(_) | Outcome::TimedOut => None,
        }
    }

    /// Returns `true` if the deadline passed before the process exited.
    pub const fn is_timed_out(self) -> bool {
        matches!(self, Outcome::TimedOut)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Exited(code) => write!(f, "exited with code {code}"),
            Outcome::Signaled(signal) => write!(f, "terminated by signal {signal}"),
            Outcome::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Decode the raw `status` as set by `waitpid(2)`.
///
/// Returns `None` for states other than exited or signaled, i.e. stopped or
/// continued processes.
pub(crate) fn decode(status: libc::c_int) -> Option<Outcome> {
    if libc::WIFEXITED(status) {
        // NOTE: `WEXITSTATUS` is already masked to 8 bits.
        Some(Outcome::Exited(libc::WEXITSTATUS(status) as u8))
    } else if libc::WIFSIGNALED(status) {
        Some(Outcome::Signaled(libc::WTERMSIG(status)))
    } else {
        None
    }
}
