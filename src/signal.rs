//! Process-wide signal handlers.
//!
//! Each signal number has at most one handler, and registering a new one
//! replaces the old one. The table is shared by every thread in the process
//! without any lock, so concurrent registrations for the same signal race and
//! the last one wins.
//!
//! Handlers run on whichever thread the signal was delivered to. For a signal
//! sent with [`ThreadHandle::kill_with`], that's the target thread. Handlers
//! should stick to async-signal-safe work, like storing to an atomic.
//!
//! [`ThreadHandle::kill_with`]: `crate::ThreadHandle::kill_with`

use std::io;
use std::mem;
use std::os::raw::c_int;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use thiserror::Error;

use crate::error::FatalError;

/// The signal sent by [`ThreadHandle::kill`] and handled by
/// [`register_signal_handler`] when no signal number is given.
///
/// [`ThreadHandle::kill`]: `crate::ThreadHandle::kill`
pub const ABNORMAL_TERMINATION: c_int = libc::SIGSEGV;

#[cfg(any(target_os = "linux", target_os = "android"))]
const SIGNAL_LIMIT: usize = 65;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SIGNAL_LIMIT: usize = 32;

type Handler = Box<dyn Fn(c_int) + Send + Sync + 'static>;

static HANDLERS: [AtomicPtr<Handler>; SIGNAL_LIMIT] =
	[const { AtomicPtr::new(ptr::null_mut()) }; SIGNAL_LIMIT];

/// An error which can occur while registering a signal handler.
#[derive(Debug, Error)]
pub enum SignalError {
	/// The number doesn't name a signal that can be handled.
	#[error("{0} is not a signal that can be handled")]
	InvalidSignal(c_int),
	#[error(transparent)]
	Fatal(#[from] FatalError),
}

extern "C" fn dispatch(signal: c_int) {
	let Some(slot) = usize::try_from(signal).ok().and_then(|i| HANDLERS.get(i)) else {
		return;
	};

	// safety: registered handlers are never freed
	if let Some(handler) = unsafe { slot.load(Ordering::Acquire).as_ref() } {
		handler(signal);
	}
}

fn slot_index(signal: c_int) -> Option<usize> {
	if signal == libc::SIGKILL || signal == libc::SIGSTOP {
		return None;
	}

	usize::try_from(signal)
		.ok()
		.filter(|&index| index > 0 && index < SIGNAL_LIMIT)
}

/// Registers `handler` for [`ABNORMAL_TERMINATION`].
///
/// See [`register_signal_handler_for`].
pub fn register_signal_handler(handler: impl Fn(c_int) + Send + Sync + 'static) -> bool {
	register_signal_handler_for(ABNORMAL_TERMINATION, handler)
}

/// Registers `handler` to be called whenever `signal` is delivered to any
/// thread in this process, replacing any handler registered before.
///
/// Returns `false` if `signal` isn't a signal that can be handled. The
/// process is terminated if the platform refuses to install the handler.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// use threading_core::signal::register_signal_handler_for;
///
/// static HANGUP: AtomicBool = AtomicBool::new(false);
///
/// assert!(register_signal_handler_for(libc::SIGHUP, |_| {
///     HANGUP.store(true, Ordering::SeqCst)
/// }));
/// assert!(!register_signal_handler_for(libc::SIGKILL, |_| ()));
/// ```
pub fn register_signal_handler_for(
	signal: c_int,
	handler: impl Fn(c_int) + Send + Sync + 'static,
) -> bool {
	match try_register_signal_handler_for(signal, handler) {
		Ok(()) => true,
		Err(SignalError::InvalidSignal(_)) => false,
		Err(SignalError::Fatal(error)) => error.terminate(),
	}
}

/// Registers `handler` for `signal`, like [`register_signal_handler_for`].
///
/// # Errors
///
/// Returns [`SignalError::InvalidSignal`] for signal numbers that are out of
/// range, or that can't be caught. Returns [`SignalError::Fatal`] if the
/// platform refused to install the handler.
pub fn try_register_signal_handler_for(
	signal: c_int,
	handler: impl Fn(c_int) + Send + Sync + 'static,
) -> Result<(), SignalError> {
	let Some(index) = slot_index(signal) else {
		tracing::warn!(signal, "not a signal that can be handled");
		return Err(SignalError::InvalidSignal(signal));
	};

	unsafe {
		let mut action: libc::sigaction = mem::zeroed();
		action.sa_sigaction = dispatch as extern "C" fn(c_int) as usize;
		action.sa_flags = libc::SA_RESTART;
		libc::sigemptyset(&mut action.sa_mask);

		if libc::sigaction(signal, &action, ptr::null_mut()) != 0 {
			let source = io::Error::last_os_error();
			tracing::error!(signal, %source, "failed to install signal handler");
			return Err(FatalError::HandlerInstall { signal, source }.into());
		}
	}

	// only published once the dispatcher is in place
	let handler: Handler = Box::new(handler);
	let handler = Box::into_raw(Box::new(handler));

	// The previous handler is leaked, because another thread may be running
	// it right now.
	let previous = HANDLERS[index].swap(handler, Ordering::AcqRel);

	tracing::info!(signal, replaced = !previous.is_null(), "signal handler registered");
	Ok(())
}
