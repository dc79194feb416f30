use std::mem::MaybeUninit;
use std::os::raw::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use crate::cancel::Cancellation;
use crate::error::ErrorCode;

use super::{Packet, SpawnError, ThreadBuilder, ThreadExit, ThreadHandle};

type ThreadMain = Box<dyn FnOnce() + Send + 'static>;

/// The entry point of every thread spawned by this crate.
extern "C" fn thread_start(main: *mut c_void) -> *mut c_void {
	// safety: this pointer came from `Box::into_raw` in `spawn_with`, and
	//         ownership was handed to this thread by `pthread_create`
	let main = unsafe { Box::from_raw(main.cast::<ThreadMain>()) };
	main();
	ptr::null_mut()
}

/// Thread attributes which are destroyed when dropped.
struct Attributes(MaybeUninit<libc::pthread_attr_t>);

impl Attributes {
	fn new() -> Result<Self, ErrorCode> {
		let mut attr = MaybeUninit::uninit();
		ErrorCode::check(unsafe { libc::pthread_attr_init(attr.as_mut_ptr()) })?;
		Ok(Self(attr))
	}

	fn set_stack_size(&mut self, size: usize) -> Result<(), ErrorCode> {
		ErrorCode::check(unsafe { libc::pthread_attr_setstacksize(self.0.as_mut_ptr(), size) })
	}

	fn as_ptr(&self) -> *const libc::pthread_attr_t {
		self.0.as_ptr()
	}
}

impl Drop for Attributes {
	fn drop(&mut self) {
		// safety: the attributes were initialized in `new`
		unsafe { libc::pthread_attr_destroy(self.0.as_mut_ptr()) };
	}
}

fn page_size() -> usize {
	match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
		size if size > 0 => size as usize,
		_ => 4096,
	}
}

impl ThreadBuilder {
	/// Creates a builder with the platform's default thread attributes.
	#[must_use]
	pub const fn new() -> Self {
		Self { stack_size: None }
	}

	/// Sets the size of the new thread's stack, in bytes.
	///
	/// The size is rounded up to a whole number of pages. Sizes below the
	/// platform minimum are rejected when the thread is spawned.
	#[must_use]
	pub const fn stack_size(mut self, size: usize) -> Self {
		self.stack_size = Some(size);
		self
	}

	/// Spawns a thread running `f`.
	///
	/// This is the same as [`ThreadBuilder::spawn_with`] with a `()` state.
	///
	/// # Errors
	///
	/// See [`ThreadBuilder::spawn_with`].
	pub fn spawn<F, R>(self, f: F) -> Result<ThreadHandle<R>, SpawnError>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		self.spawn_with(move |()| f(), ())
	}

	/// Spawns a thread running `f`, with `state` as its argument.
	///
	/// The thread begins running immediately, concurrently with the caller.
	///
	/// # Errors
	///
	/// Returns [`SpawnError::StackTooSmall`] if the configured stack is
	/// smaller than the platform allows, or [`SpawnError::Os`] if the
	/// operating system couldn't create the thread. A stack too large to round
	/// up to whole pages is reported as `EINVAL`. Nothing is leaked in
	/// either case.
	#[tracing::instrument(level = "debug", skip_all, fields(stack_size = ?self.stack_size))]
	pub fn spawn_with<F, S, R>(self, f: F, state: S) -> Result<ThreadHandle<R>, SpawnError>
	where
		F: FnOnce(S) -> R + Send + 'static,
		S: Send + 'static,
		R: Send + 'static,
	{
		let mut attributes = Attributes::new().map_err(SpawnError::Os)?;
		if let Some(requested) = self.stack_size {
			let minimum = libc::PTHREAD_STACK_MIN;
			if requested < minimum {
				tracing::error!(requested, minimum, "requested thread stack is too small");
				return Err(SpawnError::StackTooSmall { requested, minimum });
			}

			let Some(size) = requested.checked_next_multiple_of(page_size()) else {
				tracing::error!(requested, "requested thread stack can't be rounded to whole pages");
				return Err(SpawnError::Os(ErrorCode::from_raw(libc::EINVAL)));
			};
			attributes.set_stack_size(size).map_err(SpawnError::Os)?;
		}

		let packet = Arc::new(Packet::new());
		let their_packet = Arc::clone(&packet);
		let main: ThreadMain = Box::new(move || {
			their_packet.cancel.watch();
			// nothing may unwind into the C runtime
			let exit = match panic::catch_unwind(AssertUnwindSafe(move || f(state))) {
				Ok(value) => ThreadExit::Returned(value),
				Err(payload) if payload.is::<Cancellation>() => ThreadExit::Canceled,
				Err(payload) => ThreadExit::Panicked(payload),
			};
			their_packet.store(exit);
		});
		let main = Box::into_raw(Box::new(main));

		let mut native = MaybeUninit::<libc::pthread_t>::uninit();
		let code = unsafe {
			libc::pthread_create(
				native.as_mut_ptr(),
				attributes.as_ptr(),
				thread_start,
				main.cast(),
			)
		};

		if let Err(code) = ErrorCode::check(code) {
			// the thread never started, so the closure still belongs to us
			drop(unsafe { Box::from_raw(main) });
			tracing::error!(%code, "failed to create thread");
			return Err(SpawnError::Os(code));
		}

		// safety: pthread_create succeeded, so the identifier was written
		let native = unsafe { native.assume_init() };
		let handle = ThreadHandle::new(native, packet);
		tracing::info!(thread_id = ?handle.id(), "thread created");
		Ok(handle)
	}
}
