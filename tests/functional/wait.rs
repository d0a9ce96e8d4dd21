use std::thread;
use std::time::{Duration, Instant};

use pwait::signal::{send_signal, Signal};
use pwait::{wait, Outcome, Strategy, Wait, WaitFlags};

use crate::util::{
    assert_elapsed, init_logger, kill, missing_pid, pid, spawn_shell, spawn_sleeper, strategies,
};

const QUANTUM: Duration = Duration::from_millis(500);
/// Allowed scheduling latency in timing assertions.
const SLACK: Duration = Duration::from_millis(150);

#[test]
fn wait_defaults() {
    let wait = Wait::new(123);
    assert_eq!(wait.pid(), 123);
    assert_eq!(wait.flags(), WaitFlags::empty());
    assert_eq!(wait.timeout(), None);
    assert_eq!(wait.quantum(), Wait::DEFAULT_QUANTUM);
    assert_eq!(wait.quantum(), Duration::from_millis(500));
    assert_eq!(wait.strategy(), Strategy::detect());

    let wait = wait
        .with_flags(WaitFlags::UNTRACED)
        .with_timeout(Duration::from_secs(1))
        .with_quantum(Duration::from_millis(10))
        .with_strategy(Strategy::Poll);
    assert_eq!(wait.flags(), WaitFlags::UNTRACED);
    assert_eq!(wait.timeout(), Some(Duration::from_secs(1)));
    assert_eq!(wait.quantum(), Duration::from_millis(10));
    assert_eq!(wait.strategy(), Strategy::Poll);
}

#[test]
fn strategy_is_detected_once() {
    assert_eq!(Strategy::detect(), Strategy::detect());
}

#[test]
fn exit_before_timeout() {
    for strategy in strategies() {
        let child = spawn_shell("sleep 0.1; exit 7");
        let start = Instant::now();
        let outcome = Wait::new(pid(&child))
            .with_timeout(Duration::from_secs(2))
            .with_quantum(QUANTUM)
            .with_strategy(strategy)
            .wait()
            .unwrap();
        assert_eq!(outcome, Outcome::Exited(7), "strategy: {strategy:?}");
        // Process exit is noticed at most one quantum late.
        assert_elapsed(start, Duration::ZERO, QUANTUM + Duration::from_millis(100) + SLACK);
    }
}

#[test]
fn pidfd_notices_exit_without_quantum_delay() {
    if Strategy::detect() != Strategy::PidFd {
        return;
    }

    let child = spawn_shell("sleep 0.1; exit 0");
    let start = Instant::now();
    let outcome = Wait::new(pid(&child))
        .with_timeout(Duration::from_secs(10))
        .with_quantum(Duration::from_secs(5))
        .with_strategy(Strategy::PidFd)
        .wait()
        .unwrap();
    assert_eq!(outcome, Outcome::Exited(0));
    assert_elapsed(start, Duration::ZERO, Duration::from_millis(100) + SLACK);
}

#[test]
fn timeout() {
    for strategy in strategies() {
        let child = spawn_sleeper();
        let start = Instant::now();
        let outcome = Wait::new(pid(&child))
            .with_timeout(Duration::from_millis(300))
            .with_quantum(QUANTUM)
            .with_strategy(strategy)
            .wait()
            .unwrap();
        assert_eq!(outcome, Outcome::TimedOut, "strategy: {strategy:?}");
        // Quantum is larger than the timeout, the sleep must be shortened.
        assert_elapsed(start, Duration::from_millis(300), Duration::from_millis(300) + SLACK);
        kill(pid(&child));
    }
}

#[test]
fn timeout_multiple_quanta() {
    for strategy in strategies() {
        let child = spawn_sleeper();
        let start = Instant::now();
        let outcome = Wait::new(pid(&child))
            .with_timeout(Duration::from_millis(250))
            .with_quantum(Duration::from_millis(100))
            .with_strategy(strategy)
            .wait()
            .unwrap();
        assert_eq!(outcome, Outcome::TimedOut, "strategy: {strategy:?}");
        assert_elapsed(start, Duration::from_millis(250), Duration::from_millis(250) + SLACK);
        kill(pid(&child));
    }
}

#[test]
fn zero_timeout_running_process() {
    for strategy in strategies() {
        let child = spawn_sleeper();
        let start = Instant::now();
        let outcome = Wait::new(pid(&child))
            .with_timeout(Duration::ZERO)
            .with_strategy(strategy)
            .wait()
            .unwrap();
        assert_eq!(outcome, Outcome::TimedOut, "strategy: {strategy:?}");
        // Doesn't sleep for a quantum.
        assert_elapsed(start, Duration::ZERO, Duration::from_millis(50));
        kill(pid(&child));
    }
}

#[test]
fn zero_timeout_exited_process() {
    let child = spawn_shell("exit 3");
    let wait = Wait::new(pid(&child)).with_timeout(Duration::ZERO);
    limited_loop! {
        match wait.wait().unwrap() {
            Outcome::TimedOut => thread::sleep(Duration::from_millis(10)),
            outcome => {
                assert_eq!(outcome, Outcome::Exited(3));
                break;
            }
        }
    }
}

#[test]
fn no_timeout_exited_process() {
    let child = spawn_shell("exit 3");
    // Give the shell time to exit.
    thread::sleep(Duration::from_millis(200));
    let start = Instant::now();
    let outcome = Wait::new(pid(&child)).with_quantum(QUANTUM).wait().unwrap();
    assert_eq!(outcome, Outcome::Exited(3));
    assert_elapsed(start, Duration::ZERO, Duration::from_millis(50));
}

#[test]
fn no_timeout_blocks_until_exit() {
    let child = spawn_shell("sleep 0.2; exit 1");
    let outcome = Wait::new(pid(&child)).wait().unwrap();
    assert_eq!(outcome, Outcome::Exited(1));
}

#[test]
fn no_timeout_ignores_no_hang() {
    let child = spawn_shell("sleep 0.2; exit 2");
    // Without a timeout `NO_HANG` is removed, so this blocks.
    let outcome = Wait::new(pid(&child))
        .with_flags(WaitFlags::NO_HANG)
        .wait()
        .unwrap();
    assert_eq!(outcome, Outcome::Exited(2));
}

#[test]
fn killed_by_signal() {
    for strategy in strategies() {
        let child = spawn_sleeper();
        send_signal(pid(&child), Signal::Kill).unwrap();
        let outcome = Wait::new(pid(&child))
            .with_timeout(Duration::from_secs(2))
            .with_strategy(strategy)
            .wait()
            .unwrap();
        assert_eq!(outcome, Outcome::Signaled(9), "strategy: {strategy:?}");
    }
}

#[test]
fn terminated_while_waiting() {
    for strategy in strategies() {
        let child = spawn_sleeper();
        let child_pid = pid(&child);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            send_signal(child_pid, Signal::Terminate).unwrap();
        });
        let outcome = Wait::new(child_pid)
            .with_timeout(Duration::from_secs(5))
            .with_quantum(Duration::from_millis(50))
            .with_strategy(strategy)
            .wait()
            .unwrap();
        assert_eq!(outcome, Outcome::Signaled(libc::SIGTERM), "strategy: {strategy:?}");
        handle.join().unwrap();
    }
}

#[test]
fn missing_process() {
    init_logger();
    let timeouts = [None, Some(Duration::ZERO), Some(Duration::from_secs(1))];
    for strategy in strategies() {
        for timeout in timeouts {
            let start = Instant::now();
            let mut wait = Wait::new(missing_pid()).with_strategy(strategy);
            if let Some(timeout) = timeout {
                wait = wait.with_timeout(timeout);
            }
            let err = wait.wait().unwrap_err();
            assert_eq!(
                err.raw_os_error(),
                Some(libc::ECHILD),
                "strategy: {strategy:?}, timeout: {timeout:?}"
            );
            // Returned without sleeping.
            assert_elapsed(start, Duration::ZERO, Duration::from_millis(50));
        }
    }
}

#[test]
fn not_a_child() {
    init_logger();
    for strategy in strategies() {
        let start = Instant::now();
        // Init process always exists, but is never our child.
        let err = Wait::new(1)
            .with_timeout(Duration::from_secs(1))
            .with_strategy(strategy)
            .wait()
            .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ECHILD), "strategy: {strategy:?}");
        assert_elapsed(start, Duration::ZERO, Duration::from_millis(50));
    }
}

#[test]
fn already_reaped() {
    let child = spawn_shell("exit 0");
    assert_eq!(Wait::new(pid(&child)).wait().unwrap(), Outcome::Exited(0));
    for strategy in strategies() {
        let err = Wait::new(pid(&child))
            .with_timeout(Duration::from_millis(100))
            .with_strategy(strategy)
            .wait()
            .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ECHILD), "strategy: {strategy:?}");
    }
}

#[test]
fn stopped_process_is_not_an_outcome() {
    for strategy in strategies() {
        let child = spawn_sleeper();
        send_signal(pid(&child), libc::SIGSTOP).unwrap();
        let outcome = Wait::new(pid(&child))
            .with_flags(WaitFlags::UNTRACED)
            .with_timeout(Duration::from_millis(200))
            .with_quantum(Duration::from_millis(20))
            .with_strategy(strategy)
            .wait()
            .unwrap();
        assert_eq!(outcome, Outcome::TimedOut, "strategy: {strategy:?}");
        kill(pid(&child));
    }
}

#[test]
fn no_timeout_waits_past_stopped_process() {
    let child = spawn_sleeper();
    let child_pid = pid(&child);
    send_signal(child_pid, libc::SIGSTOP).unwrap();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        send_signal(child_pid, Signal::Kill).unwrap();
    });

    // The stop is reported first, but isn't an outcome, so the wait keeps
    // going until the process is killed.
    let start = Instant::now();
    let outcome = Wait::new(child_pid)
        .with_flags(WaitFlags::UNTRACED)
        .wait()
        .unwrap();
    assert_eq!(outcome, Outcome::Signaled(libc::SIGKILL));
    assert!(start.elapsed() >= Duration::from_millis(150));
    handle.join().unwrap();
}

#[test]
fn zero_quantum_is_raised() {
    let child = spawn_shell("sleep 0.1; exit 5");
    let outcome = Wait::new(pid(&child))
        .with_timeout(Duration::from_secs(2))
        .with_quantum(Duration::ZERO)
        .with_strategy(Strategy::Poll)
        .wait()
        .unwrap();
    assert_eq!(outcome, Outcome::Exited(5));
}

#[test]
fn wait_function() {
    let child = spawn_shell("sleep 0.1; exit 7");
    let outcome = wait(
        pid(&child),
        WaitFlags::empty(),
        Some(Duration::from_secs(2)),
        QUANTUM,
    )
    .unwrap();
    assert_eq!(outcome, Outcome::Exited(7));

    let child = spawn_shell("exit 4");
    let outcome = wait(pid(&child), WaitFlags::empty(), None, QUANTUM).unwrap();
    assert_eq!(outcome, Outcome::Exited(4));
}

#[test]
fn concurrent_waits() {
    let children: Vec<_> = (0..4)
        .map(|code| spawn_shell(&format!("sleep 0.{code}; exit {code}")))
        .collect();
    let handles: Vec<_> = children
        .iter()
        .map(|child| {
            let pid = pid(child);
            thread::spawn(move || {
                Wait::new(pid)
                    .with_timeout(Duration::from_secs(5))
                    .with_quantum(Duration::from_millis(50))
                    .wait()
            })
        })
        .collect();
    for (code, handle) in handles.into_iter().enumerate() {
        let outcome = handle.join().unwrap().unwrap();
        assert_eq!(outcome, Outcome::Exited(code as u8));
    }
}
