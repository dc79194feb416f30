use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancel::CancelRequest;
use crate::error::ErrorCode;

mod builder;
mod error;
mod handle;

pub use error::{SpawnError, WaitError};

/// The native identifier of a thread.
///
/// This is only useful for logging and comparisons. It can't be used to
/// operate on the thread; that requires the [`ThreadHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(libc::pthread_t);

/// An owned handle to a running native thread.
///
/// There is exactly one handle for each thread spawned by this crate, and it
/// can't be cloned. Waiting on the thread or destroying the handle consumes
/// it, so a handle can never be used after its thread has been reaped.
///
/// Dropping the handle detaches the thread, which keeps running but can no
/// longer be waited on.
///
/// # Examples
///
/// ```
/// let handle = threading_core::create(|| 6 * 7).unwrap();
/// let exit = handle.wait().unwrap();
/// assert_eq!(exit.returned(), Some(42));
/// ```
pub struct ThreadHandle<R> {
	native: libc::pthread_t,
	packet: Arc<Packet<R>>,
}

/// The slot a thread stores its outcome in before it terminates.
struct Packet<R> {
	exit: Mutex<Option<ThreadExit<R>>>,
	cancel: Arc<CancelRequest>,
}

/// How a thread's procedure ended.
pub enum ThreadExit<R> {
	/// The procedure returned this value.
	Returned(R),
	/// The procedure panicked with this payload.
	Panicked(Box<dyn Any + Send + 'static>),
	/// The thread was cancelled before its procedure returned.
	Canceled,
}

/// Per-thread configuration, used to spawn threads with non-default
/// attributes.
///
/// # Examples
///
/// ```
/// use threading_core::ThreadBuilder;
///
/// let handle = ThreadBuilder::new()
///     .stack_size(256 * 1024)
///     .spawn(|| "done")
///     .unwrap();
/// assert_eq!(handle.wait().unwrap().returned(), Some("done"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadBuilder {
	stack_size: Option<usize>,
}

impl<R> Debug for ThreadExit<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Returned(_) => f.write_str("Returned(..)"),
			Self::Panicked(_) => f.write_str("Panicked(..)"),
			Self::Canceled => f.write_str("Canceled"),
		}
	}
}

impl<R> ThreadExit<R> {
	/// The value the procedure returned, if it returned normally.
	#[must_use]
	pub fn returned(self) -> Option<R> {
		match self {
			Self::Returned(value) => Some(value),
			_ => None,
		}
	}

	#[must_use]
	pub const fn is_canceled(&self) -> bool {
		matches!(self, Self::Canceled)
	}

	#[must_use]
	pub const fn is_panicked(&self) -> bool {
		matches!(self, Self::Panicked(_))
	}
}

/// Spawns a thread running `f`.
///
/// The thread starts immediately. This is the same as calling
/// [`create_with`] with a `()` state.
pub fn create<F, R>(f: F) -> Result<ThreadHandle<R>, SpawnError>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	ThreadBuilder::new().spawn(f)
}

/// Spawns a thread running `f`, and moves `state` into it as the procedure's
/// only argument.
///
/// # Examples
///
/// ```
/// use threading_core::marshal::{demarshal_int, marshal_int};
///
/// let arg = marshal_int(20).unwrap();
/// let handle = threading_core::create_with(|arg| demarshal_int(arg) + 1, arg).unwrap();
/// assert_eq!(handle.wait().unwrap().returned(), Some(21));
/// ```
pub fn create_with<F, S, R>(f: F, state: S) -> Result<ThreadHandle<R>, SpawnError>
where
	F: FnOnce(S) -> R + Send + 'static,
	S: Send + 'static,
	R: Send + 'static,
{
	ThreadBuilder::new().spawn_with(f, state)
}

/// Waits for the thread in `slot` to terminate, discarding whatever its
/// procedure returned.
///
/// If the thread was joined, the slot is emptied. If the join failed, the
/// handle stays in the slot and the native error code is returned. An empty
/// slot returns [`ErrorCode::NO_THREAD`] without blocking.
pub fn wait<R>(slot: &mut Option<ThreadHandle<R>>) -> ErrorCode {
	match wait_for(slot) {
		Ok(_) => ErrorCode::SUCCESS,
		Err(code) => code,
	}
}

/// Waits for the thread in `slot` to terminate, and returns how it exited.
///
/// The slot is emptied only if the thread was joined.
pub fn wait_for<R>(slot: &mut Option<ThreadHandle<R>>) -> Result<ThreadExit<R>, ErrorCode> {
	let Some(handle) = slot.take() else {
		tracing::warn!("the thread handle is invalid, so there is nothing to wait for");
		return Err(ErrorCode::NO_THREAD);
	};

	match handle.wait() {
		Ok(exit) => Ok(exit),
		Err(WaitError { handle, code }) => {
			*slot = Some(handle);
			Err(code)
		}
	}
}

/// Releases the handle in `slot` without waiting for its thread.
///
/// Destroying an empty slot does nothing and reports success, so this may be
/// called any number of times.
pub fn destroy<R>(slot: &mut Option<ThreadHandle<R>>) -> ErrorCode {
	match slot.take() {
		Some(handle) => handle.destroy(),
		None => {
			tracing::warn!("the thread handle is invalid, assuming it was already destroyed");
			ErrorCode::SUCCESS
		}
	}
}

/// Sends [`ABNORMAL_TERMINATION`] to the thread, if there is one.
///
/// [`ABNORMAL_TERMINATION`]: `crate::signal::ABNORMAL_TERMINATION`
pub fn kill<R>(handle: Option<&ThreadHandle<R>>) {
	kill_with(handle, crate::signal::ABNORMAL_TERMINATION)
}

/// Sends `signal` to the thread, if there is one.
///
/// See [`ThreadHandle::kill_with`].
pub fn kill_with<R>(handle: Option<&ThreadHandle<R>>, signal: libc::c_int) {
	match handle {
		Some(handle) => handle.kill_with(signal),
		None => tracing::warn!(signal, "the thread handle is invalid, so no signal was sent"),
	}
}

/// Asks the thread to cancel itself, if there is one.
///
/// See [`ThreadHandle::cancel`].
pub fn cancel<R>(handle: Option<&ThreadHandle<R>>) -> ErrorCode {
	match handle {
		Some(handle) => handle.cancel(),
		None => {
			tracing::warn!("the thread handle is invalid, so no cancellation was requested");
			ErrorCode::NO_THREAD
		}
	}
}
