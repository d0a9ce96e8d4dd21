//! Process signals: names, dispositions and sending them.
//!
//! These are thin wrappers around [`signal(2)`] and [`kill(2)`]. Functions
//! that take a signal accept either a [`Signal`] or a raw signal number.
//!
//! [`signal(2)`]: https://man7.org/linux/man-pages/man2/signal.2.html
//! [`kill(2)`]: https://man7.org/linux/man-pages/man2/kill.2.html

use std::str::FromStr;
use std::{error, fmt, io};

use log::debug;

use crate::Pid;

/// All signals supported by [`Signal`].
pub const ALL_SIGNALS: [Signal; 12] = [
    Signal::Hangup,
    Signal::Interrupt,
    Signal::Quit,
    Signal::Illegal,
    Signal::Trap,
    Signal::Abort,
    Signal::FloatingPoint,
    Signal::Kill,
    Signal::Segfault,
    Signal::Pipe,
    Signal::Alarm,
    Signal::Terminate,
];

/// Process signal.
///
/// # Examples
///
/// Parsing a signal from its POSIX name.
///
/// ```
/// use pwait::signal::Signal;
///
/// let signal: Signal = "SIGTERM".parse().unwrap();
/// assert_eq!(signal, Signal::Terminate);
/// assert_eq!(signal.to_signo(), libc::SIGTERM);
/// assert_eq!(format!("{signal:#}"), "terminate (SIGTERM)");
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Signal {
    /// Hangup of the controlling terminal, or death of the controlling
    /// process.
    ///
    /// Corresponds to POSIX signal `SIGHUP`.
    Hangup,
    /// Interrupt from the keyboard, e.g. Ctrl+C.
    ///
    /// Corresponds to POSIX signal `SIGINT`.
    Interrupt,
    /// Quit from the keyboard, requests a core dump.
    ///
    /// Corresponds to POSIX signal `SIGQUIT`.
    Quit,
    /// Illegal instruction.
    ///
    /// Corresponds to POSIX signal `SIGILL`.
    Illegal,
    /// Trace or breakpoint trap.
    ///
    /// Corresponds to POSIX signal `SIGTRAP`.
    Trap,
    /// Abort, e.g. from `abort(3)`.
    ///
    /// Corresponds to POSIX signal `SIGABRT`.
    Abort,
    /// Floating-point (arithmetic) exception.
    ///
    /// Corresponds to POSIX signal `SIGFPE`.
    FloatingPoint,
    /// Kill signal, can't be caught, blocked or ignored.
    ///
    /// Corresponds to POSIX signal `SIGKILL`.
    Kill,
    /// Invalid memory reference.
    ///
    /// Corresponds to POSIX signal `SIGSEGV`.
    Segfault,
    /// Write to a pipe with no readers.
    ///
    /// Corresponds to POSIX signal `SIGPIPE`.
    Pipe,
    /// Timer signal from `alarm(2)`.
    ///
    /// Corresponds to POSIX signal `SIGALRM`.
    Alarm,
    /// Termination request.
    ///
    /// Corresponds to POSIX signal `SIGTERM`.
    Terminate,
}

impl Signal {
    /// Turns a signal number into a `Signal`. Returns `None` if we don't have a
    /// variant for the signal number.
    pub const fn from_signo(signo: libc::c_int) -> Option<Signal> {
        Some(match signo {
            libc::SIGHUP => Signal::Hangup,
            libc::SIGINT => Signal::Interrupt,
            libc::SIGQUIT => Signal::Quit,
            libc::SIGILL => Signal::Illegal,
            libc::SIGTRAP => Signal::Trap,
            libc::SIGABRT => Signal::Abort,
            libc::SIGFPE => Signal::FloatingPoint,
            libc::SIGKILL => Signal::Kill,
            libc::SIGSEGV => Signal::Segfault,
            libc::SIGPIPE => Signal::Pipe,
            libc::SIGALRM => Signal::Alarm,
            libc::SIGTERM => Signal::Terminate,
            _ => return None,
        })
    }

    /// Returns the signal as signal number.
    pub const fn to_signo(self) -> libc::c_int {
        match self {
            Signal::Hangup => libc::SIGHUP,
            Signal::Interrupt => libc::SIGINT,
            Signal::Quit => libc::SIGQUIT,
            Signal::Illegal => libc::SIGILL,
            Signal::Trap => libc::SIGTRAP,
            Signal::Abort => libc::SIGABRT,
            Signal::FloatingPoint => libc::SIGFPE,
            Signal::Kill => libc::SIGKILL,
            Signal::Segfault => libc::SIGSEGV,
            Signal::Pipe => libc::SIGPIPE,
            Signal::Alarm => libc::SIGALRM,
            Signal::Terminate => libc::SIGTERM,
        }
    }

    /// Returns a human readable name for the signal.
    pub const fn as_str(self) -> &'static str {
        match self {
            Signal::Hangup => "hangup",
            Signal::Interrupt => "interrupt",
            Signal::Quit => "quit",
            Signal::Illegal => "illegal instruction",
            Signal::Trap => "trap",
            Signal::Abort => "abort",
            Signal::FloatingPoint => "floating-point exception",
            Signal::Kill => "kill",
            Signal::Segfault => "segmentation fault",
            Signal::Pipe => "broken pipe",
            Signal::Alarm => "alarm",
            Signal::Terminate => "terminate",
        }
    }

    /// Returns the name of the POSIX constant of the signal.
    pub const fn as_posix(self) -> &'static str {
        match self {
            Signal::Hangup => "SIGHUP",
            Signal::Interrupt => "SIGINT",
            Signal::Quit => "SIGQUIT",
            Signal::Illegal => "SIGILL",
            Signal::Trap => "SIGTRAP",
            Signal::Abort => "SIGABRT",
            Signal::FloatingPoint => "SIGFPE",
            Signal::Kill => "SIGKILL",
            Signal::Segfault => "SIGSEGV",
            Signal::Pipe => "SIGPIPE",
            Signal::Alarm => "SIGALRM",
            Signal::Terminate => "SIGTERM",
        }
    }
}

impl From<Signal> for libc::c_int {
    fn from(signal: Signal) -> libc::c_int {
        signal.to_signo()
    }
}

impl FromStr for Signal {
    type Err = ParseSignalError;

    /// Parses the POSIX name, e.g. `SIGTERM`. The `SIG` prefix is optional.
    fn from_str(name: &str) -> Result<Signal, ParseSignalError> {
        let name = name.strip_prefix("SIG").unwrap_or(name);
        ALL_SIGNALS
            .into_iter()
            .find(|signal| &signal.as_posix()[3..] == name)
            .ok_or(ParseSignalError(()))
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())?;
        if f.alternate() {
            f.write_str(" (")?;
            f.write_str(self.as_posix())?;
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Error returned when parsing an unknown signal name.
#[derive(Debug)]
pub struct ParseSignalError(());

impl fmt::Display for ParseSignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown signal name")
    }
}

impl error::Error for ParseSignalError {}

/// What happens when a process receives a signal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// Ignore the signal (`SIG_IGN`).
    Ignore,
    /// Default action of the signal (`SIG_DFL`).
    Default,
}

impl Disposition {
    const fn handler(self) -> libc::sighandler_t {
        match self {
            Disposition::Ignore => libc::SIG_IGN,
            Disposition::Default => libc::SIG_DFL,
        }
    }
}

impl FromStr for Disposition {
    type Err = ParseDispositionError;

    /// Parses `ignore` or `SIG_IGN`, and `default` or `SIG_DFL`.
    fn from_str(name: &str) -> Result<Disposition, ParseDispositionError> {
        match name {
            "ignore" | "SIG_IGN" => Ok(Disposition::Ignore),
            "default" | "SIG_DFL" => Ok(Disposition::Default),
            _ => Err(ParseDispositionError(())),
        }
    }
}

/// Error returned when parsing an unknown signal disposition.
#[derive(Debug)]
pub struct ParseDispositionError(());

impl fmt::Display for ParseDispositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown signal disposition, expected `ignore` or `default`")
    }
}

impl error::Error for ParseDispositionError {}

/// Set the disposition of `signal` for the entire process.
///
/// # Errors
///
/// Returns `EINVAL` for invalid signals and for `SIGKILL` and `SIGSTOP`,
/// whose dispositions can't be changed.
///
/// # Examples
///
/// ```
/// use pwait::signal::{set_disposition, Disposition, Signal};
///
/// # fn main() -> std::io::Result<()> {
/// set_disposition(Signal::Pipe, Disposition::Ignore)?;
/// set_disposition(Signal::Pipe, Disposition::Default)?;
///
/// assert!(set_disposition(Signal::Kill, Disposition::Ignore).is_err());
/// # Ok(())
/// # }
/// ```
pub fn set_disposition<S>(signal: S, disposition: Disposition) -> io::Result<()>
where
    S: Into<libc::c_int>,
{
    let signo = signal.into();
    debug!(signal = signo, disposition:? = disposition; "setting signal disposition");
    // SAFETY: `SIG_IGN` and `SIG_DFL` are always valid handlers.
    if unsafe { libc::signal(signo, disposition.handler()) } == libc::SIG_ERR {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Send `signal` to the process with `pid`.
///
/// # Errors
///
/// Returns `ESRCH` if the process doesn't exist and `EPERM` if we're not
/// allowed to signal it.
pub fn send_signal<S>(pid: Pid, signal: S) -> io::Result<()>
where
    S: Into<libc::c_int>,
{
    let signo = signal.into();
    debug!(pid = pid, signal = signo; "sending signal to process");
    syscall!(kill(pid, signo)).map(|_| ())
}
