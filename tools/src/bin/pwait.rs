//! Tool to run a command with a timeout, similar to `timeout(1)`.
//!
//! ```text
//! pwait [--timeout MS] [--quantum MS] [--poll] [--signal NAME] [--kill-after MS] COMMAND [ARG..]
//! ```
//!
//! Exits with the exit code of the command, `128 + signal` if the command was
//! terminated by a signal, 124 if it timed out and 125 if the tool itself
//! failed.

use std::env::args;
use std::num::ParseIntError;
use std::process::{exit, Command};
use std::time::Duration;
use std::{fmt, io};

use log::{debug, error, info, warn};
use pwait::signal::{send_signal, ParseSignalError, Signal};
use pwait::{Outcome, Pid, Strategy, Wait};

const EXIT_TIMED_OUT: i32 = 124;
const EXIT_ERROR: i32 = 125;

const USAGE: &str = "usage: pwait [--timeout MS] [--quantum MS] [--poll] [--signal NAME] [--kill-after MS] COMMAND [ARG..]";

fn main() {
    std_logger::Config::logfmt().init();
    let code = match Options::parse(args().skip(1)) {
        Ok(Some(options)) => match run(options) {
            Ok(code) => code,
            Err(err) => {
                error!("{err}");
                EXIT_ERROR
            }
        },
        Ok(None) => {
            println!("{USAGE}");
            0
        }
        Err(err) => {
            eprintln!("{err}\n{USAGE}");
            EXIT_ERROR
        }
    };
    exit(code)
}

/// Command line options.
#[derive(Debug, PartialEq)]
struct Options {
    timeout: Option<Duration>,
    quantum: Duration,
    strategy: Option<Strategy>,
    signal: Signal,
    kill_after: Option<Duration>,
    command: Vec<String>,
}

impl Options {
    /// Parse the options from `args`, returns `None` if help was requested.
    fn parse<I>(args: I) -> Result<Option<Options>, Error>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Options {
            timeout: None,
            quantum: Wait::DEFAULT_QUANTUM,
            strategy: None,
            signal: Signal::Terminate,
            kill_after: None,
            command: Vec::new(),
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(None),
                "-t" | "--timeout" => options.timeout = Some(parse_millis(&arg, args.next())?),
                "-q" | "--quantum" => options.quantum = parse_millis(&arg, args.next())?,
                "-k" | "--kill-after" => {
                    options.kill_after = Some(parse_millis(&arg, args.next())?);
                }
                "-s" | "--signal" => {
                    let name = args.next().ok_or_else(|| Error::missing_value(&arg))?;
                    options.signal = name.parse().map_err(|err| Error::signal_name(&name, err))?;
                }
                "--poll" => options.strategy = Some(Strategy::Poll),
                "--" => {
                    options.command.extend(args);
                    break;
                }
                _ if arg.starts_with('-') => return Err(Error::usage(format!("unknown option '{arg}'"))),
                _ => {
                    options.command.push(arg);
                    options.command.extend(args);
                    break;
                }
            }
        }

        if options.command.is_empty() {
            return Err(Error::usage("missing command".to_owned()));
        }
        Ok(Some(options))
    }
}

fn parse_millis(option: &str, value: Option<String>) -> Result<Duration, Error> {
    let value = value.ok_or_else(|| Error::missing_value(option))?;
    value
        .parse()
        .map(Duration::from_millis)
        .map_err(|err| Error::duration(option, &value, err))
}

/// Run the command, returns the exit code for the tool.
fn run(options: Options) -> Result<i32, Error> {
    let (program, arguments) = options
        .command
        .split_first()
        .ok_or_else(|| Error::usage("missing command".to_owned()))?;
    let child = Command::new(program)
        .args(arguments)
        .spawn()
        .map_err(|err| Error::spawn(program, err))?;
    let pid = child.id() as Pid;
    debug!(pid = pid, command = program.as_str(); "started command");

    let mut wait = Wait::new(pid).with_quantum(options.quantum);
    if let Some(timeout) = options.timeout {
        wait = wait.with_timeout(timeout);
    }
    if let Some(strategy) = options.strategy {
        wait = wait.with_strategy(strategy);
    }

    let outcome = wait.wait().map_err(Error::wait)?;
    if !outcome.is_timed_out() {
        debug!(pid = pid, outcome:% = outcome; "command stopped");
        return Ok(exit_code(outcome));
    }

    info!(pid = pid, signal:% = options.signal; "command timed out, sending signal");
    send_signal(pid, options.signal).map_err(Error::send_signal)?;
    let mut wait = Wait::new(pid).with_quantum(options.quantum);
    if let Some(kill_after) = options.kill_after {
        wait = wait.with_timeout(kill_after);
    }
    let outcome = wait.wait().map_err(Error::wait)?;
    if outcome.is_timed_out() {
        warn!(pid = pid; "command still running, killing it");
        send_signal(pid, Signal::Kill).map_err(Error::send_signal)?;
        _ = Wait::new(pid).wait().map_err(Error::wait)?;
    }
    Ok(EXIT_TIMED_OUT)
}

/// Maps the `outcome` of the command to the exit code for the tool.
fn exit_code(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::Exited(code) => code.into(),
        Outcome::Signaled(signal) => 128 + signal,
        Outcome::TimedOut => EXIT_TIMED_OUT,
    }
}

/// Error returned by the tool.
struct Error {
    inner: ErrorInner,
}

/// Inside of `Error` error.
enum ErrorInner {
    /// Invalid command line arguments.
    Usage(String),
    /// Invalid duration argument.
    Duration(String, ParseIntError),
    /// Invalid signal name.
    SignalName(String, ParseSignalError),
    /// Error spawning the command.
    Spawn(String, io::Error),
    /// Error waiting on the command.
    Wait(io::Error),
    /// Error sending a signal to the command.
    SendSignal(io::Error),
}

impl Error {
    const fn usage(msg: String) -> Error {
        Error {
            inner: ErrorInner::Usage(msg),
        }
    }

    fn missing_value(option: &str) -> Error {
        Error::usage(format!("missing value for '{option}'"))
    }

    fn duration(option: &str, value: &str, err: ParseIntError) -> Error {
        Error {
            inner: ErrorInner::Duration(format!("{option} {value}"), err),
        }
    }

    fn signal_name(name: &str, err: ParseSignalError) -> Error {
        Error {
            inner: ErrorInner::SignalName(name.to_owned(), err),
        }
    }

    fn spawn(program: &str, err: io::Error) -> Error {
        Error {
            inner: ErrorInner::Spawn(program.to_owned(), err),
        }
    }

    const fn wait(err: io::Error) -> Error {
        Error {
            inner: ErrorInner::Wait(err),
        }
    }

    const fn send_signal(err: io::Error) -> Error {
        Error {
            inner: ErrorInner::SendSignal(err),
        }
    }
}

/// We implement [`Debug`] by using [`Display`] implementation.
///
/// [`Debug`]: std::fmt::Debug
/// [`Display`]: std::fmt::Display
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DESC: &str = "pwait";
        match self.inner {
            ErrorInner::Usage(ref msg) => write!(f, "{DESC}: {msg}"),
            ErrorInner::Duration(ref arg, ref err) => {
                write!(f, "{DESC}: invalid duration in '{arg}': {err}")
            }
            ErrorInner::SignalName(ref name, ref err) => write!(f, "{DESC}: {err} '{name}'"),
            ErrorInner::Spawn(ref program, ref err) => {
                write!(f, "{DESC}: failed to start '{program}': {err}")
            }
            ErrorInner::Wait(ref err) => write!(f, "{DESC}: error waiting on command: {err}"),
            ErrorInner::SendSignal(ref err) => {
                write!(f, "{DESC}: error sending signal to command: {err}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.inner {
            ErrorInner::Usage(_) => None,
            ErrorInner::Duration(_, ref err) => Some(err),
            ErrorInner::SignalName(_, ref err) => Some(err),
            ErrorInner::Spawn(_, ref err)
            | ErrorInner::Wait(ref err)
            | ErrorInner::SendSignal(ref err) => Some(err),
        }
    }
}
