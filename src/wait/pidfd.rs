//! Waiting using a pidfd, see [`pidfd_open(2)`].
//!
//! [`pidfd_open(2)`]: https://man7.org/linux/man-pages/man2/pidfd_open.2.html

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::{Duration, Instant};

use log::{debug, trace};

use super::{poll, reap};
use crate::{Outcome, Pid, WaitFlags};

/// File descriptor referring to a process.
///
/// Becomes readable once the process exits. Closed on drop.
#[derive(Debug)]
struct PidFd {
    fd: OwnedFd,
}

impl PidFd {
    /// Open a pidfd for process `pid`.
    fn open(pid: Pid) -> io::Result<PidFd> {
        #[cfg(target_os = "linux")]
        let res = syscall!(syscall(libc::SYS_pidfd_open, pid, 0));
        #[cfg(not(target_os = "linux"))]
        let res: io::Result<libc::c_long> = {
            _ = pid;
            Err(io::Error::from_raw_os_error(libc::ENOSYS))
        };
        // SAFETY: `pidfd_open(2)` ensures the fd is valid.
        #[allow(clippy::cast_possible_truncation)]
        let fd = unsafe { OwnedFd::from_raw_fd(res? as libc::c_int) };
        Ok(PidFd { fd })
    }

    /// Wait until the process exits, or `timeout` elapses.
    ///
    /// Returns `true` if the process exited, `false` if the timeout elapsed.
    /// If the wait is interrupted by a signal it continues with the time
    /// remaining. A `timeout` too large to be represented as an [`Instant`]
    /// never elapses.
    fn poll(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = deadline(timeout);
        let mut remaining = timeout;
        loop {
            let mut pollfd = libc::pollfd {
                fd: self.fd.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            match syscall!(poll(&mut pollfd, 1, timeout_ms(remaining))) {
                Ok(0) => {} // Timeout, or the timeout was capped.
                Ok(_) => return Ok(true),
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {
                    trace!("polling pidfd interrupted, continuing");
                }
                Err(err) => return Err(err),
            }

            // Without a deadline keep polling until the process exits.
            if let Some(deadline) = deadline {
                match deadline.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => remaining = left,
                    _ => return Ok(false),
                }
            }
        }
    }
}

/// Returns `true` if the kernel supports pidfds.
pub(super) fn is_supported() -> bool {
    // SAFETY: `getpid(2)` always succeeds.
    let pid = unsafe { libc::getpid() };
    match PidFd::open(pid) {
        Ok(_) => true,
        Err(err) => {
            debug!(error:% = err; "pidfd not supported");
            false
        }
    }
}

/// Wait for process `pid` by polling a pidfd.
///
/// `flags` must contain [`WaitFlags::NO_HANG`].
pub(super) fn wait(
    pid: Pid,
    flags: WaitFlags,
    timeout: Duration,
    quantum: Duration,
) -> io::Result<Outcome> {
    debug_assert!(flags.contains(WaitFlags::NO_HANG));
    match PidFd::open(pid) {
        Ok(pidfd) => {
            // A pidfd can be opened for any process, not just our children.
            // Check once before polling so that processes we can't reap
            // return an error right away, rather than after the timeout.
            if let Some(outcome) = reap(pid, flags)? {
                return Ok(outcome);
            }
            let exited = pidfd.poll(timeout)?;
            trace!(pid = pid, exited = exited; "done polling pidfd");
        }
        // The process doesn't exist, let `waitpid(2)` report the error.
        Err(ref err) if matches!(err.raw_os_error(), Some(libc::ESRCH | libc::EINVAL)) => {
            debug!(pid = pid, error:% = err; "failed to open pidfd, reaping directly");
        }
        Err(err) => {
            debug!(pid = pid, error:% = err; "failed to open pidfd, falling back to polling");
            return poll::wait(pid, flags, timeout, quantum);
        }
    }
    Ok(reap(pid, flags)?.unwrap_or(Outcome::TimedOut))
}

/// Returns the point in time `timeout` from now.
///
/// Returns `None` if it can't be represented, in which case the timeout is
/// treated as infinite.
fn deadline(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Convert `timeout` into milliseconds for `poll(2)`, rounding up so that we
/// don't wake up before the timeout.
fn timeout_ms(timeout: Duration) -> libc::c_int {
    let ms = timeout.as_nanos().div_ceil(1_000_000);
    libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
}
