//! Cooperative cancellation controls for the calling thread.
//!
//! Another thread requests cancellation with [`ThreadHandle::cancel`]. The
//! request only takes effect while the target has cancellation enabled, and
//! only at a cancellation point. [`test_cancel`] is always one. A thread with
//! the [`CancelType::Asynchronous`] type also acts on a pending request as
//! soon as it enables cancellation or switches to that type.
//!
//! A thread acts on the request by unwinding out of its procedure, dropping
//! everything it owns on the way. Waiting on it then reports
//! [`ThreadExit::Canceled`]. A procedure that catches unwinds itself, with
//! [`std::panic::catch_unwind`], can swallow the request.
//!
//! Requests only reach threads spawned by this crate. These settings apply
//! to the thread that calls them, not to any handle.
//!
//! [`ThreadHandle::cancel`]: `crate::ThreadHandle::cancel`
//! [`ThreadExit::Canceled`]: `crate::ThreadExit::Canceled`

use std::cell::RefCell;
use std::os::raw::c_int;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ErrorCode, FatalError, InvalidArgument};
use crate::sys;

thread_local! {
	static REQUEST: RefCell<Option<Arc<CancelRequest>>> = const { RefCell::new(None) };
}

/// A cancellation request shared by a thread and its handle.
#[derive(Debug, Default)]
pub(crate) struct CancelRequest(AtomicBool);

/// The unwind payload of a thread acting on a cancellation request.
pub(crate) struct Cancellation;

impl CancelRequest {
	pub(crate) fn request(&self) {
		self.0.store(true, Ordering::Release);
	}

	fn is_requested(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}

	/// Makes this the request the calling thread answers to.
	pub(crate) fn watch(self: &Arc<Self>) {
		REQUEST.set(Some(Arc::clone(self)));
	}
}

/// Whether the calling thread may be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelState {
	Enabled,
	Disabled,
}

/// When the calling thread acts on a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelType {
	/// Only at a cancellation point.
	Deferred,
	/// At any time.
	Asynchronous,
}

impl CancelState {
	#[must_use]
	pub const fn as_raw(self) -> c_int {
		match self {
			Self::Enabled => sys::PTHREAD_CANCEL_ENABLE,
			Self::Disabled => sys::PTHREAD_CANCEL_DISABLE,
		}
	}
}

impl CancelType {
	#[must_use]
	pub const fn as_raw(self) -> c_int {
		match self {
			Self::Deferred => sys::PTHREAD_CANCEL_DEFERRED,
			Self::Asynchronous => sys::PTHREAD_CANCEL_ASYNCHRONOUS,
		}
	}
}

impl TryFrom<c_int> for CancelState {
	type Error = InvalidArgument;

	fn try_from(value: c_int) -> Result<Self, Self::Error> {
		match value {
			sys::PTHREAD_CANCEL_ENABLE => Ok(Self::Enabled),
			sys::PTHREAD_CANCEL_DISABLE => Ok(Self::Disabled),
			value => Err(InvalidArgument {
				setting: "cancellation state",
				value,
			}),
		}
	}
}

impl TryFrom<c_int> for CancelType {
	type Error = InvalidArgument;

	fn try_from(value: c_int) -> Result<Self, Self::Error> {
		match value {
			sys::PTHREAD_CANCEL_DEFERRED => Ok(Self::Deferred),
			sys::PTHREAD_CANCEL_ASYNCHRONOUS => Ok(Self::Asynchronous),
			value => Err(InvalidArgument {
				setting: "cancellation type",
				value,
			}),
		}
	}
}

impl From<bool> for CancelState {
	fn from(enabled: bool) -> Self {
		if enabled {
			Self::Enabled
		} else {
			Self::Disabled
		}
	}
}

/// Sets whether the calling thread can be cancelled, and returns the
/// previous state.
///
/// For a thread of the asynchronous type, enabling cancellation is a
/// cancellation point.
///
/// The process is terminated if the state can't be applied.
pub fn set_cancel_state(state: CancelState) -> CancelState {
	try_set_cancel_state(state).unwrap_or_else(|error| error.terminate())
}

/// Sets whether the calling thread can be cancelled, like
/// [`set_cancel_state`].
///
/// # Errors
///
/// Returns [`FatalError::CancelState`] if the platform rejected the setting.
pub fn try_set_cancel_state(state: CancelState) -> Result<CancelState, FatalError> {
	let mut previous = 0;
	let code = unsafe { sys::pthread_setcancelstate(state.as_raw(), &mut previous) };
	ErrorCode::check(code).map_err(|code| {
		tracing::error!(?state, %code, "failed to set thread cancellation state");
		FatalError::CancelState(code)
	})?;

	let previous = CancelState::try_from(previous)
		.map_err(|_| FatalError::CancelState(ErrorCode::from_raw(libc::EINVAL)))?;
	tracing::info!(?state, ?previous, "thread cancellation state set");

	if state == CancelState::Enabled && native_type() == sys::PTHREAD_CANCEL_ASYNCHRONOUS {
		test_cancel();
	}
	Ok(previous)
}

/// Sets when the calling thread acts on cancellation requests, and returns
/// the previous type.
///
/// Switching to the asynchronous type is a cancellation point.
///
/// The process is terminated if the type can't be applied.
pub fn set_cancel_type(kind: CancelType) -> CancelType {
	try_set_cancel_type(kind).unwrap_or_else(|error| error.terminate())
}

/// Sets when the calling thread acts on cancellation requests, like
/// [`set_cancel_type`].
///
/// # Errors
///
/// Returns [`FatalError::CancelType`] if the platform rejected the setting.
pub fn try_set_cancel_type(kind: CancelType) -> Result<CancelType, FatalError> {
	let mut previous = 0;
	let code = unsafe { sys::pthread_setcanceltype(kind.as_raw(), &mut previous) };
	ErrorCode::check(code).map_err(|code| {
		tracing::error!(?kind, %code, "failed to set thread cancellation type");
		FatalError::CancelType(code)
	})?;

	let previous = CancelType::try_from(previous)
		.map_err(|_| FatalError::CancelType(ErrorCode::from_raw(libc::EINVAL)))?;
	tracing::info!(?kind, ?previous, "thread cancellation type set");

	if kind == CancelType::Asynchronous {
		test_cancel();
	}
	Ok(previous)
}

// Reads a setting by swapping in `probe` and putting the old value back.
fn read_setting(probe: c_int, set: unsafe extern "C" fn(c_int, *mut c_int) -> c_int) -> c_int {
	let (mut current, mut ignored) = (0, 0);
	// safety: both calls only write to the integers they are given
	unsafe {
		set(probe, &mut current);
		set(current, &mut ignored);
	}
	current
}

fn native_state() -> c_int {
	read_setting(sys::PTHREAD_CANCEL_DISABLE, sys::pthread_setcancelstate)
}

fn native_type() -> c_int {
	read_setting(sys::PTHREAD_CANCEL_DEFERRED, sys::pthread_setcanceltype)
}

/// A cancellation point.
///
/// If cancellation is enabled and has been requested, the calling thread
/// unwinds out of its procedure from here, and this never returns.
pub fn test_cancel() {
	let requested = REQUEST.with_borrow(|request| {
		request
			.as_ref()
			.is_some_and(|request| request.is_requested())
	});
	if requested && native_state() == sys::PTHREAD_CANCEL_ENABLE {
		tracing::info!("acting on cancellation request");
		panic::resume_unwind(Box::new(Cancellation));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn raw_values_round_trip() {
		for state in [CancelState::Enabled, CancelState::Disabled] {
			assert_eq!(CancelState::try_from(state.as_raw()), Ok(state));
		}

		for kind in [CancelType::Deferred, CancelType::Asynchronous] {
			assert_eq!(CancelType::try_from(kind.as_raw()), Ok(kind));
		}
	}

	#[test]
	fn unrecognized_values_are_invalid_arguments() {
		let error = CancelState::try_from(42).unwrap_err();
		assert_eq!(error.to_string(), "42 is not a recognized cancellation state");
		assert!(CancelType::try_from(-7).is_err());
	}

	#[test]
	fn bool_maps_to_state() {
		assert_eq!(CancelState::from(true), CancelState::Enabled);
		assert_eq!(CancelState::from(false), CancelState::Disabled);
	}

	#[test]
	fn new_threads_start_enabled_and_deferred() {
		std::thread::spawn(|| {
			assert_eq!(set_cancel_state(CancelState::Disabled), CancelState::Enabled);
			assert_eq!(set_cancel_state(CancelState::Enabled), CancelState::Disabled);

			assert_eq!(set_cancel_type(CancelType::Asynchronous), CancelType::Deferred);
			assert_eq!(set_cancel_type(CancelType::Deferred), CancelType::Asynchronous);
		})
		.join()
		.unwrap();
	}

	#[test]
	fn reading_a_setting_leaves_it_alone() {
		std::thread::spawn(|| {
			assert_eq!(native_state(), sys::PTHREAD_CANCEL_ENABLE);
			set_cancel_state(CancelState::Disabled);
			assert_eq!(native_state(), sys::PTHREAD_CANCEL_DISABLE);
			assert_eq!(native_state(), sys::PTHREAD_CANCEL_DISABLE);
			assert_eq!(native_type(), sys::PTHREAD_CANCEL_DEFERRED);
		})
		.join()
		.unwrap();
	}

	#[test]
	fn requests_only_reach_watching_threads() {
		let request = Arc::new(CancelRequest::default());
		request.request();
		// this thread never watches the request, so it has nothing to act on
		std::thread::spawn(test_cancel).join().unwrap();
		assert!(request.is_requested());
	}

	#[test]
	fn test_cancel_returns_without_a_request() {
		std::thread::spawn(test_cancel).join().unwrap();
	}
}
