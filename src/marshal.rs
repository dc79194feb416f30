//! Moving small values across a thread boundary.
//!
//! Marshalling copies a value from the caller's stack onto the heap, where
//! it outlives the caller's frame and can be handed to another thread.
//! Demarshalling copies it back out and releases the heap storage.
//!
//! Each marshalled value has exactly one owner. Demarshalling consumes it, so
//! it can't be read or released twice.
//!
//! # Examples
//!
//! ```
//! use threading_core::marshal::{demarshal_block_from_thread, marshal_block_to_thread};
//!
//! let message = *b"hello";
//! let block = marshal_block_to_thread(&message).unwrap();
//!
//! let handle = threading_core::create_with(|block| block, block).unwrap();
//! let block = handle.wait().unwrap().returned().unwrap();
//!
//! let mut received = [0; 5];
//! demarshal_block_from_thread(&mut received, block, 5).unwrap();
//! assert_eq!(&received, b"hello");
//! ```

use std::os::raw::c_int;

mod block;
mod error;

pub use block::{
	demarshal_block_from_thread, demarshal_int, marshal_block, marshal_block_to_thread,
	marshal_int,
};
pub use error::{DemarshalError, MarshalError};

/// A block of bytes that has been copied onto the heap.
///
/// The block is never empty. Dropping it releases the heap storage.
pub struct MarshalledBlock {
	bytes: Box<[u8]>,
}

/// A single integer that has been copied onto the heap.
pub struct MarshalledInt {
	value: Box<[c_int]>,
}
