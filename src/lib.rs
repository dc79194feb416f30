//! Owned handles to native threads, and a way to move values between them.
//!
//! A thread is spawned with [`create`] or [`create_with`], which return the
//! only [`ThreadHandle`] for it. Waiting on the thread or destroying its
//! handle consumes the handle, so a thread can never be joined twice, or
//! joined after its handle was released. Where a caller keeps a handle in a
//! slot, the free functions [`wait`] and [`destroy`] take an
//! `&mut Option<ThreadHandle<R>>` and empty it, with `None` standing in for
//! an invalid handle.
//!
//! A thread may also be sent a signal with [`ThreadHandle::kill_with`], or
//! asked to stop with [`ThreadHandle::cancel`]. The [`signal`] and
//! [`cancel`](mod@cancel) modules control how threads respond to those.
//!
//! The [`marshal`] module copies stack values onto the heap, so they can be
//! handed to a thread as its argument or returned from one.
//!
//! Native failures that leave the process in an inconsistent state, such as
//! a signal that can't be delivered, terminate the process. Each of those
//! operations has a `try_` form that returns a [`FatalError`] instead.
//!
//! # Examples
//!
//! ```
//! use threading_core::marshal::{demarshal_int, marshal_int};
//!
//! let arg = marshal_int(41).unwrap();
//! let mut slot = Some(threading_core::create_with(|arg| demarshal_int(arg) + 1, arg).unwrap());
//!
//! let exit = threading_core::wait_for(&mut slot).unwrap();
//! assert_eq!(exit.returned(), Some(42));
//! assert!(slot.is_none());
//! ```

#[cfg(not(unix))]
compile_error!("threading-core requires a platform with POSIX threads");

mod error;
mod sys;
mod thread;

pub mod cancel;
pub mod marshal;
pub mod signal;

pub use error::{ErrorCode, FatalError, InvalidArgument};
pub use thread::{
	cancel, create, create_with, destroy, kill, kill_with, wait, wait_for, SpawnError, ThreadBuilder,
	ThreadExit, ThreadHandle, ThreadId, WaitError,
};
