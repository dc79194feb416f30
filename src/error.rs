use std::fmt::{self, Debug, Display};
use std::io;
use std::os::raw::c_int;

use thiserror::Error;

/// A native error code, as returned by the pthread family of functions.
///
/// Zero means success. Any positive value is an `errno` value. The negative
/// [`ErrorCode::NO_THREAD`] code is reserved for operations that were given
/// no thread handle at all, so it can never be confused with a native result.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(c_int);

impl ErrorCode {
	/// The operation succeeded.
	pub const SUCCESS: Self = Self(0);

	/// There was no live thread handle to operate on.
	pub const NO_THREAD: Self = Self(-1);

	#[must_use]
	pub const fn from_raw(code: c_int) -> Self {
		Self(code)
	}

	#[must_use]
	pub const fn raw(self) -> c_int {
		self.0
	}

	#[must_use]
	pub const fn is_success(self) -> bool {
		self.0 == 0
	}

	/// Converts the return value of a pthread call into a `Result`.
	pub(crate) fn check(code: c_int) -> Result<(), Self> {
		if code == 0 {
			Ok(())
		} else {
			Err(Self(code))
		}
	}
}

impl Debug for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ErrorCode").field(&self.0).finish()
	}
}

impl Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			Self::SUCCESS => f.write_str("success"),
			Self::NO_THREAD => f.write_str("no thread to operate on"),
			Self(code) => Display::fmt(&io::Error::from_raw_os_error(code), f),
		}
	}
}

impl From<ErrorCode> for c_int {
	fn from(value: ErrorCode) -> Self {
		value.0
	}
}

/// A native value that doesn't correspond to any recognized setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{value} is not a recognized {setting}")]
pub struct InvalidArgument {
	pub(crate) setting: &'static str,
	pub(crate) value: c_int,
}

/// A failure of the platform that leaves no way to continue.
///
/// The `try_` functions in this crate return this error so the failure can be
/// inspected. Everything else hands it straight to [`FatalError::terminate`].
#[derive(Debug, Error)]
pub enum FatalError {
	#[error("failed to deliver signal {signal} to a thread: {code}")]
	SignalDelivery { signal: c_int, code: ErrorCode },
	#[error("failed to set thread cancellation state: {0}")]
	CancelState(ErrorCode),
	#[error("failed to set thread cancellation type: {0}")]
	CancelType(ErrorCode),
	#[error("failed to install a handler for signal {signal}: {source}")]
	HandlerInstall {
		signal: c_int,
		#[source]
		source: io::Error,
	},
}

impl FatalError {
	/// The status the process exits with after a fatal failure.
	pub const EXIT_STATUS: i32 = -1;

	/// Logs the failure and exits the process.
	#[mutants::skip] // this would kill the test runner
	pub fn terminate(self) -> ! {
		tracing::error!(error = %self, "unrecoverable native failure, terminating the process");
		std::process::exit(Self::EXIT_STATUS)
	}
}
