use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use threading_core::signal::{register_signal_handler, register_signal_handler_for};
use threading_core::{create, ErrorCode, FatalError, ThreadHandle};

const CHILD: &str = "THREADING_CORE_KILL_CHILD";

fn is_child(test: &str) -> bool {
	std::env::var(CHILD).is_ok_and(|name| name == test)
}

/// Runs a single test from this binary in a separate process.
fn run_in_child(test: &str) -> ExitStatus {
	Command::new(std::env::current_exe().unwrap())
		.args(["--exact", test, "--test-threads=1"])
		.env(CHILD, test)
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.status()
		.unwrap()
}

#[test]
fn kill_with_a_registered_handler_is_survivable() {
	static HANDLED: AtomicBool = AtomicBool::new(false);

	assert!(register_signal_handler_for(libc::SIGUSR1, |_| {
		HANDLED.store(true, Ordering::SeqCst)
	}));

	let handle = create(|| {
		while !HANDLED.load(Ordering::SeqCst) {
			std::thread::yield_now();
		}
		"survived"
	})
	.unwrap();

	handle.kill_with(libc::SIGUSR1);
	assert_eq!(handle.wait().unwrap().returned(), Some("survived"));
}

#[test]
fn kill_sends_abnormal_termination() {
	const NAME: &str = "kill_sends_abnormal_termination";
	static HANDLED: AtomicUsize = AtomicUsize::new(0);

	if !is_child(NAME) {
		assert!(run_in_child(NAME).success());
		return;
	}

	assert!(register_signal_handler(|_| {
		HANDLED.fetch_add(1, Ordering::SeqCst);
	}));

	let handle = create(|| {
		while HANDLED.load(Ordering::SeqCst) == 0 {
			std::thread::yield_now();
		}
	})
	.unwrap();

	handle.kill();
	handle.wait().unwrap();
	assert_eq!(HANDLED.load(Ordering::SeqCst), 1);
}

#[test]
fn kill_without_a_handler_applies_the_default_action() {
	const NAME: &str = "kill_without_a_handler_applies_the_default_action";

	if !is_child(NAME) {
		assert_eq!(run_in_child(NAME).signal(), Some(libc::SIGTERM));
		return;
	}

	let handle: ThreadHandle<()> = create(|| loop {
		std::thread::sleep(Duration::from_millis(10));
	})
	.unwrap();

	handle.kill_with(libc::SIGTERM);
	std::thread::sleep(Duration::from_secs(30));
	unreachable!("the default action of SIGTERM should have ended the process");
}

#[test]
fn fatal_errors_exit_the_process() {
	const NAME: &str = "fatal_errors_exit_the_process";

	if !is_child(NAME) {
		let status = run_in_child(NAME);
		assert_eq!(status.code(), Some(FatalError::EXIT_STATUS & 0xFF));
		return;
	}

	FatalError::CancelState(ErrorCode::from_raw(libc::EINVAL)).terminate()
}
