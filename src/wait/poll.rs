//! Waiting by repeatedly attempting to reap the process.

use std::time::Duration;
use std::{cmp, io, mem};

use log::{trace, warn};

use super::reap;
use crate::{Outcome, Pid, WaitFlags};

/// Wait for process `pid` by attempting to reap it every `quantum`.
///
/// `flags` must contain [`WaitFlags::NO_HANG`].
pub(super) fn wait(
    pid: Pid,
    flags: WaitFlags,
    timeout: Duration,
    quantum: Duration,
) -> io::Result<Outcome> {
    debug_assert!(flags.contains(WaitFlags::NO_HANG));
    poll_loop(|| reap(pid, flags), sleep, timeout, quantum)
}

/// Call `reap` until it returns an outcome or until the total time slept
/// reaches `timeout`.
///
/// `sleep` must return the time it actually slept, which may be less than
/// requested if it was interrupted. The last sleep is shortened so that the
/// total doesn't exceed `timeout`.
fn poll_loop<R, S>(
    mut reap: R,
    mut sleep: S,
    timeout: Duration,
    quantum: Duration,
) -> io::Result<Outcome>
where
    R: FnMut() -> io::Result<Option<Outcome>>,
    S: FnMut(Duration) -> Duration,
{
    let mut slept = Duration::ZERO;
    loop {
        if let Some(outcome) = reap()? {
            return Ok(outcome);
        }
        if slept >= timeout {
            return Ok(Outcome::TimedOut);
        }
        let nap = cmp::min(quantum, timeout - slept);
        slept += sleep(nap);
    }
}

/// Sleep for `duration`, returning the time actually slept.
///
/// Returns early if the sleep is interrupted by a signal.
fn sleep(duration: Duration) -> Duration {
    // SAFETY: all zero is valid for `timespec`.
    let mut request: libc::timespec = unsafe { mem::zeroed() };
    request.tv_sec = libc::time_t::try_from(duration.as_secs()).unwrap_or(libc::time_t::MAX);
    request.tv_nsec = duration.subsec_nanos() as _;
    let mut remaining: libc::timespec = unsafe { mem::zeroed() };

    match syscall!(nanosleep(&request, &mut remaining)) {
        Ok(_) => duration,
        Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let remaining = Duration::new(remaining.tv_sec as u64, remaining.tv_nsec as u32);
            let slept = duration.saturating_sub(remaining);
            trace!(slept:? = slept, requested:? = duration; "sleep interrupted");
            slept
        }
        Err(err) => {
            // Can only be `EINVAL` or `EFAULT`, neither of which we expect.
            warn!(error:% = err; "unexpected error sleeping, continuing");
            duration
        }
    }
}
