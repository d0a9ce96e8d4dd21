//! Waiting on a process, with or without a timeout.
//!
//! See [`Wait`].

use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use log::{debug, trace};

use crate::status::{self, Outcome};
use crate::{Pid, WaitFlags};

mod pidfd;
mod poll;

/// Wait for a process to exit.
///
/// By default there is no timeout, [`Wait::wait`] blocks until the process
/// exits. Set one using [`Wait::with_timeout`].
///
/// # Examples
///
/// Checking if a child is still running, without blocking.
///
/// ```
/// use std::process::Command;
/// use std::time::Duration;
///
/// use pwait::{Outcome, Wait};
///
/// # fn main() -> std::io::Result<()> {
/// let mut child = Command::new("sleep").arg("10").spawn()?;
/// let outcome = Wait::new(child.id() as pwait::Pid)
///     .with_timeout(Duration::ZERO)
///     .wait()?;
/// assert_eq!(outcome, Outcome::TimedOut);
/// # child.kill()?;
/// # _ = child.wait()?;
/// # Ok(())
/// # }
/// ```
#[derive(Copy, Clone, Debug)]
#[must_use = "`Wait` does nothing until `Wait::wait` is called"]
pub struct Wait {
    pid: Pid,
    flags: WaitFlags,
    timeout: Option<Duration>,
    quantum: Duration,
    strategy: Option<Strategy>,
}

impl Wait {
    /// Default time between reap attempts, see [`Wait::with_quantum`].
    pub const DEFAULT_QUANTUM: Duration = Duration::from_millis(500);
    /// Minimum time between reap attempts, smaller quanta are raised to this.
    pub const MIN_QUANTUM: Duration = Duration::from_millis(1);

    /// Wait for the process with `pid`.
    pub const fn new(pid: Pid) -> Wait {
        Wait {
            pid,
            flags: WaitFlags::empty(),
            timeout: None,
            quantum: Wait::DEFAULT_QUANTUM,
            strategy: None,
        }
    }

    /// Returns the pid of the process to wait on.
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// Returns the flags passed to `waitpid(2)`.
    pub const fn flags(&self) -> WaitFlags {
        self.flags
    }

    /// Set the flags passed to `waitpid(2)`.
    ///
    /// [`WaitFlags::NO_HANG`] is ignored, whether or not it's set depends on
    /// the timeout.
    pub const fn with_flags(mut self, flags: WaitFlags) -> Wait {
        self.flags = flags;
        self
    }

    /// Returns the timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set the maximum time to wait for the process to exit.
    ///
    /// A timeout of zero doesn't block at all, it only checks if the process
    /// exited.
    ///
    /// # Notes
    ///
    /// The timeout is a soft deadline, it may be overshot by the scheduling
    /// latency of the OS.
    pub const fn with_timeout(mut self, timeout: Duration) -> Wait {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the time between reap attempts.
    pub const fn quantum(&self) -> Duration {
        self.quantum
    }

    /// Set the time between reap attempts.
    ///
    /// Only used by [`Strategy::Poll`], defaults to
    /// [`Wait::DEFAULT_QUANTUM`]. A process exiting is noticed at most
    /// `quantum` late.
    pub const fn with_quantum(mut self, quantum: Duration) -> Wait {
        self.quantum = quantum;
        self
    }

    /// Returns the strategy used for waits with a timeout.
    ///
    /// Defaults to [`Strategy::detect`].
    pub fn strategy(&self) -> Strategy {
        self.strategy.unwrap_or_else(Strategy::detect)
    }

    /// Overwrite the detected strategy.
    pub const fn with_strategy(mut self, strategy: Strategy) -> Wait {
        self.strategy = Some(strategy);
        self
    }

    /// Wait for the process to exit.
    ///
    /// Returns [`Outcome::TimedOut`] if a timeout is set and the process did
    /// not exit before it.
    ///
    /// # Errors
    ///
    /// Returns the error from `waitpid(2)` as is, e.g. `ECHILD` if the process
    /// is not a child of this process (or was already reaped). Without a
    /// timeout this includes `EINTR` when a signal handler interrupts the
    /// wait.
    pub fn wait(self) -> io::Result<Outcome> {
        match self.timeout {
            None => {
                let flags = self.flags.without(WaitFlags::NO_HANG);
                debug!(pid = self.pid; "waiting on process without timeout");
                loop {
                    if let Some(outcome) = reap(self.pid, flags)? {
                        return Ok(outcome);
                    }
                    // Stopped or continued process, only reported if
                    // requested in the flags. Keep waiting for the exit.
                }
            }
            Some(timeout) if timeout.is_zero() => {
                let flags = self.flags.with(WaitFlags::NO_HANG);
                Ok(reap(self.pid, flags)?.unwrap_or(Outcome::TimedOut))
            }
            Some(timeout) => {
                let flags = self.flags.with(WaitFlags::NO_HANG);
                let quantum = self.quantum.max(Wait::MIN_QUANTUM);
                let strategy = self.strategy();
                debug!(pid = self.pid, timeout:? = timeout, strategy:? = strategy; "waiting on process");
                match strategy {
                    Strategy::PidFd => pidfd::wait(self.pid, flags, timeout, quantum),
                    Strategy::Poll => poll::wait(self.pid, flags, timeout, quantum),
                }
            }
        }
    }
}

/// Mechanism used to wait on a process with a timeout.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Strategy {
    /// Poll a [pidfd] for the process, waking up once the process exits.
    ///
    /// Only supported on Linux 5.3 and later. If a pidfd can't be opened the
    /// wait falls back to [`Strategy::Poll`].
    ///
    /// [pidfd]: https://man7.org/linux/man-pages/man2/pidfd_open.2.html
    PidFd,
    /// Attempt to reap the process every quantum, sleeping in between.
    Poll,
}

impl Strategy {
    /// Returns the best strategy supported by the running kernel.
    ///
    /// The kernel is only probed once, the result is cached for the lifetime
    /// of the process.
    pub fn detect() -> Strategy {
        static DETECTED: OnceLock<Strategy> = OnceLock::new();
        *DETECTED.get_or_init(|| {
            let strategy = if pidfd::is_supported() {
                Strategy::PidFd
            } else {
                Strategy::Poll
            };
            debug!(strategy:? = strategy; "detected process wait strategy");
            strategy
        })
    }
}

/// Attempt to reap process `pid`.
///
/// Returns `Ok(None)` if the process has not changed state (only possible
/// with `NO_HANG`), or if it was stopped or continued.
fn reap(pid: Pid, flags: WaitFlags) -> io::Result<Option<Outcome>> {
    let mut status: libc::c_int = 0;
    if syscall!(waitpid(pid, &mut status, flags.bits()))? == 0 {
        trace!(pid = pid; "process has not changed state");
        return Ok(None);
    }
    let outcome = status::decode(status);
    trace!(pid = pid, status = status, outcome:? = outcome; "process changed state");
    Ok(outcome)
}
