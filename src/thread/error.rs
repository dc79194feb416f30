use core::fmt;
use std::error::Error;

use crate::error::ErrorCode;

use super::ThreadHandle;

/// An error which can occur while spawning a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
	/// The requested stack is smaller than the platform's minimum.
	#[error("a {requested} byte stack is smaller than the minimum of {minimum} bytes")]
	StackTooSmall { requested: usize, minimum: usize },
	/// The operating system couldn't create the thread.
	#[error("failed to create a thread: {0}")]
	Os(ErrorCode),
}

/// The error returned when a thread couldn't be waited on.
///
/// The thread hasn't been reaped, so the handle is still live. It can be
/// recovered with [`WaitError::into_handle`].
pub struct WaitError<R> {
	pub(crate) handle: ThreadHandle<R>,
	pub(crate) code: ErrorCode,
}

impl<R> fmt::Debug for WaitError<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WaitError")
			.field("code", &self.code)
			.finish_non_exhaustive()
	}
}

impl<R> fmt::Display for WaitError<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "failed to wait for thread: {}", self.code)
	}
}

impl<R> Error for WaitError<R> {}

impl<R> WaitError<R> {
	pub(crate) fn new(handle: ThreadHandle<R>, code: ErrorCode) -> Self {
		Self { handle, code }
	}

	/// The native error code the join failed with.
	#[must_use]
	pub const fn code(&self) -> ErrorCode {
		self.code
	}

	/// Takes back the handle of the thread that couldn't be waited on.
	#[must_use]
	pub fn into_handle(self) -> ThreadHandle<R> {
		self.handle
	}

	#[must_use]
	pub const fn handle(&self) -> &ThreadHandle<R> {
		&self.handle
	}
}
