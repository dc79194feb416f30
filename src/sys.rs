// Bindings for the pthread cancellation settings, which the libc crate
// doesn't cover on every target.

use std::os::raw::c_int;

#[cfg(not(target_vendor = "apple"))]
mod consts {
	use std::os::raw::c_int;

	pub const PTHREAD_CANCEL_ENABLE: c_int = 0;
	pub const PTHREAD_CANCEL_DISABLE: c_int = 1;
	pub const PTHREAD_CANCEL_DEFERRED: c_int = 0;
	pub const PTHREAD_CANCEL_ASYNCHRONOUS: c_int = 1;
}

#[cfg(target_vendor = "apple")]
mod consts {
	use std::os::raw::c_int;

	pub const PTHREAD_CANCEL_ENABLE: c_int = 0x01;
	pub const PTHREAD_CANCEL_DISABLE: c_int = 0x00;
	pub const PTHREAD_CANCEL_DEFERRED: c_int = 0x02;
	pub const PTHREAD_CANCEL_ASYNCHRONOUS: c_int = 0x00;
}

pub use consts::*;

extern "C" {
	pub fn pthread_setcancelstate(state: c_int, oldstate: *mut c_int) -> c_int;
	pub fn pthread_setcanceltype(kind: c_int, oldtype: *mut c_int) -> c_int;
}
