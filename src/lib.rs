//! Pwait waits for a child process to exit, optionally bounded by a timeout.
//!
//! ## About
//!
//! Unix doesn't offer a `waitpid(2)` with a timeout. This crate provides one
//! on top of two mechanisms:
//!  * a [pidfd], which can be polled like any other file descriptor and
//!    becomes readable once the process exits (Linux 5.3+),
//!  * a poll loop, which attempts a non-blocking reap every
//!    [quantum](Wait::with_quantum), used where pidfds are not available.
//!
//! Which mechanism is used is decided once per process, see
//! [`Strategy::detect`]. Either way the caller gets the same [`Outcome`].
//!
//! [pidfd]: https://man7.org/linux/man-pages/man2/pidfd_open.2.html
//!
//! ## Examples
//!
//! Waiting for a child with a timeout.
//!
//! ```
//! use std::process::Command;
//! use std::time::Duration;
//!
//! use pwait::{Outcome, Wait};
//!
//! # fn main() -> std::io::Result<()> {
//! let child = Command::new("true").spawn()?;
//! let outcome = Wait::new(child.id() as pwait::Pid)
//!     .with_timeout(Duration::from_secs(5))
//!     .wait()?;
//! assert_eq!(outcome, Outcome::Exited(0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Logging is done via the [`log`] crate, the library never installs a logger
//! itself.
//!
//! [`log`]: https://crates.io/crates/log

#![warn(
    anonymous_parameters,
    bare_trait_objects,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
// Disallow warnings when running tests.
#![cfg_attr(test, deny(warnings))]
// Disallow warnings in examples, we want to set a good example after all.
#![doc(test(attr(deny(warnings))))]

#[cfg(not(unix))]
compile_error!("pwait only supports Unix platforms");

use std::io;
use std::time::Duration;

/// Helper macro to execute a system call that returns an `io::Result`.
///
/// `errno` is read directly after the call, before anything else can
/// overwrite it.
macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)? ) ) => {{
        let res = unsafe { libc::$fn($( $arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

mod flags;
pub mod signal;
mod status;
mod wait;

#[doc(inline)]
pub use flags::WaitFlags;
#[doc(inline)]
pub use status::Outcome;
#[doc(inline)]
pub use wait::{Strategy, Wait};

/// Process identifier.
pub type Pid = libc::pid_t;

/// Wait for process `pid` to change state.
///
/// This is a shorthand for the [`Wait`] builder:
///
/// * `deadline` of `None` blocks until the process exits,
/// * `deadline` of zero checks once and returns [`Outcome::TimedOut`] if the
///   process is still running,
/// * any other `deadline` waits at most that long.
///
/// `quantum` is the time between reap attempts when the poll strategy is
/// used, see [`Wait::with_quantum`].
///
/// # Errors
///
/// Returns the error from `waitpid(2)` as is, e.g. `ECHILD` if `pid` is not
/// a child of this process (or was already reaped).
pub fn wait(
    pid: Pid,
    flags: WaitFlags,
    deadline: Option<Duration>,
    quantum: Duration,
) -> io::Result<Outcome> {
    let mut wait = Wait::new(pid).with_flags(flags).with_quantum(quantum);
    if let Some(deadline) = deadline {
        wait = wait.with_timeout(deadline);
    }
    wait.wait()
}
