use std::fmt::{self, Debug};
use std::mem::ManuallyDrop;
use std::os::raw::c_int;
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ErrorCode, FatalError};
use crate::signal::ABNORMAL_TERMINATION;

use super::{Packet, ThreadExit, ThreadHandle, ThreadId, WaitError};

// safety: the native identifier may be used from any thread, and the packet
//         only hands R to whichever thread ends up waiting
unsafe impl<R: Send> Send for ThreadHandle<R> {}

impl<R> Packet<R> {
	pub(super) fn new() -> Self {
		Self {
			exit: Mutex::new(None),
			cancel: Arc::default(),
		}
	}

	pub(super) fn store(&self, exit: ThreadExit<R>) {
		*self.exit.lock() = Some(exit);
	}

	// a thread that never stored anything was stopped before it could
	fn take_exit(&self) -> ThreadExit<R> {
		self.exit.lock().take().unwrap_or(ThreadExit::Canceled)
	}
}

impl<R> Debug for ThreadHandle<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ThreadHandle")
			.field("id", &self.id())
			.finish_non_exhaustive()
	}
}

impl<R> Drop for ThreadHandle<R> {
	fn drop(&mut self) {
		// nobody is left to wait on the thread, so let it clean up after itself
		let code = unsafe { libc::pthread_detach(self.native) };
		if let Err(code) = ErrorCode::check(code) {
			tracing::error!(thread_id = ?self.id(), %code, "failed to detach a dropped thread");
		}
	}
}

impl<R> ThreadHandle<R> {
	pub(super) fn new(native: libc::pthread_t, packet: Arc<Packet<R>>) -> Self {
		Self { native, packet }
	}

	/// Takes the packet out of the handle without detaching the thread.
	fn into_packet(self) -> Arc<Packet<R>> {
		let this = ManuallyDrop::new(self);
		// safety: `this` is never dropped, so the packet is only read once
		unsafe { ptr::read(&this.packet) }
	}

	/// The native identifier of this thread.
	#[must_use]
	pub fn id(&self) -> ThreadId {
		ThreadId(self.native)
	}

	/// Checks if the thread has finished running its procedure.
	///
	/// A finished thread can be waited on without blocking for long.
	#[must_use]
	pub fn is_finished(&self) -> bool {
		// the thread drops its clone of the packet once it has stored a result
		Arc::strong_count(&self.packet) == 1
	}

	/// Blocks until the thread terminates, and returns how it exited.
	///
	/// If the thread has already terminated, this returns immediately.
	/// Everything the thread did before terminating is visible to the caller
	/// once this returns.
	///
	/// # Errors
	///
	/// If the native join fails, the handle is given back inside the
	/// [`WaitError`] along with the native error code. This happens, for
	/// example, if a thread tries to wait on itself.
	pub fn wait(self) -> Result<ThreadExit<R>, WaitError<R>> {
		let thread_id = self.id();
		tracing::info!(?thread_id, "waiting for thread to terminate");

		let mut retval = ptr::null_mut();
		let code = unsafe { libc::pthread_join(self.native, &mut retval) };
		if let Err(code) = ErrorCode::check(code) {
			tracing::error!(?thread_id, %code, "failed to join thread");
			return Err(WaitError::new(self, code));
		}

		// the thread has been reaped, so it must not be detached afterwards
		let exit = self.into_packet().take_exit();
		tracing::info!(?thread_id, ?exit, "thread terminated");
		Ok(exit)
	}

	/// Releases the handle without waiting for the thread.
	///
	/// This doesn't stop the thread. It keeps running, and releases its own
	/// resources when it terminates. Whatever its procedure returns is
	/// discarded.
	pub fn destroy(self) -> ErrorCode {
		let thread_id = self.id();
		let code = unsafe { libc::pthread_detach(self.native) };
		drop(self.into_packet());

		match ErrorCode::check(code) {
			Ok(()) => tracing::info!(?thread_id, "thread handle destroyed"),
			Err(code) => tracing::error!(?thread_id, %code, "failed to detach thread"),
		}

		ErrorCode::from_raw(code)
	}

	/// Sends [`ABNORMAL_TERMINATION`] to the thread.
	///
	/// The process is terminated if the signal can't be delivered.
	///
	/// [`ABNORMAL_TERMINATION`]: `crate::signal::ABNORMAL_TERMINATION`
	pub fn kill(&self) {
		self.kill_with(ABNORMAL_TERMINATION)
	}

	/// Sends `signal` to the thread, then yields the processor so the thread
	/// gets a chance to react.
	///
	/// A non-positive signal number does nothing. If no handler is registered
	/// for the signal, its default action applies, which for most signals
	/// terminates the whole process.
	///
	/// The process is terminated if the signal can't be delivered. Use
	/// [`ThreadHandle::try_kill_with`] to inspect that failure instead.
	pub fn kill_with(&self, signal: c_int) {
		if let Err(error) = self.try_kill_with(signal) {
			error.terminate()
		}
	}

	/// Sends `signal` to the thread, like [`ThreadHandle::kill_with`].
	///
	/// # Errors
	///
	/// Returns [`FatalError::SignalDelivery`] if the signal couldn't be
	/// delivered. Callers are expected to treat this as unrecoverable.
	pub fn try_kill_with(&self, signal: c_int) -> Result<(), FatalError> {
		let thread_id = self.id();
		if signal <= 0 {
			tracing::warn!(?thread_id, signal, "not a signal number, so no signal was sent");
			return Ok(());
		}

		tracing::info!(?thread_id, signal, "sending signal to thread");
		let code = unsafe { libc::pthread_kill(self.native, signal) };
		ErrorCode::check(code).map_err(|code| FatalError::SignalDelivery { signal, code })?;

		// force a context switch
		unsafe { libc::sched_yield() };
		Ok(())
	}

	/// Asks the thread to cancel itself.
	///
	/// The thread only acts on the request at a cancellation point, and only
	/// if it hasn't disabled cancellation. See [`crate::cancel`]. Requests
	/// can't fail, so this always returns [`ErrorCode::SUCCESS`].
	pub fn cancel(&self) -> ErrorCode {
		self.packet.cancel.request();
		tracing::info!(thread_id = ?self.id(), finished = self.is_finished(), "cancellation requested");
		ErrorCode::SUCCESS
	}
}

#[cfg(test)]
mod tests {
	use std::sync::mpsc;

	use crate::thread::create;

	use super::*;

	#[test]
	fn unfinished_until_its_procedure_returns() {
		let (tx, rx) = mpsc::channel::<()>();
		let handle = create(move || rx.recv().is_err()).unwrap();
		assert!(!handle.is_finished());

		drop(tx);
		assert_eq!(handle.wait().unwrap().returned(), Some(true));
	}

	#[test]
	fn non_positive_signals_are_not_sent() {
		let handle = create(|| ()).unwrap();
		assert!(handle.try_kill_with(0).is_ok());
		assert!(handle.try_kill_with(-4).is_ok());
		handle.wait().unwrap();
	}

	#[cfg(target_env = "gnu")]
	#[test]
	fn waiting_on_yourself_gives_the_handle_back() {
		let (handle_tx, handle_rx) = mpsc::channel::<ThreadHandle<()>>();
		let (code_tx, code_rx) = mpsc::channel();

		let handle = create(move || {
			let me = handle_rx.recv().unwrap();
			let error = me.wait().unwrap_err();
			code_tx.send(error.code()).unwrap();
			error.into_handle().destroy();
		})
		.unwrap();

		handle_tx.send(handle).unwrap();
		assert_eq!(code_rx.recv().unwrap(), ErrorCode::from_raw(libc::EDEADLK));
	}

	#[test]
	fn debug_shows_the_id() {
		let handle = create(|| ()).unwrap();
		let debug = format!("{handle:?}");
		assert!(debug.starts_with("ThreadHandle { id: "));
		handle.wait().unwrap();
	}
}
