use std::fmt::{self, Debug};
use std::mem;
use std::os::raw::c_int;
use std::ptr;

use super::{DemarshalError, MarshalError, MarshalledBlock, MarshalledInt};

/// Copies `source` into a new heap allocation of exactly the same length.
fn copy_to_heap<T: Copy>(source: &[T]) -> Result<Box<[T]>, MarshalError> {
	if source.is_empty() {
		return Err(MarshalError::ZeroSize);
	}

	let mut heap = Vec::new();
	heap.try_reserve_exact(source.len())
		.map_err(|_| MarshalError::OutOfMemory {
			size: mem::size_of_val(source),
		})?;
	heap.extend_from_slice(source);
	Ok(heap.into_boxed_slice())
}

impl Debug for MarshalledBlock {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MarshalledBlock")
			.field("len", &self.len())
			.finish_non_exhaustive()
	}
}

impl Debug for MarshalledInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("MarshalledInt").field(&self.get()).finish()
	}
}

impl MarshalledBlock {
	/// The size of the block, in bytes. This is never zero.
	#[must_use]
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	#[must_use]
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// The heap address of the block.
	#[must_use]
	pub fn as_ptr(&self) -> *const u8 {
		self.bytes.as_ptr()
	}

	/// Takes the bytes out of the block without copying them.
	#[must_use]
	pub fn into_bytes(self) -> Box<[u8]> {
		self.bytes
	}

	/// Gives up ownership of the block, returning its address and length.
	///
	/// This is meant for passing the block through an opaque pointer. The
	/// block must be recovered with [`MarshalledBlock::from_raw`], or it is
	/// leaked.
	#[must_use]
	pub fn into_raw(self) -> (*mut u8, usize) {
		let len = self.bytes.len();
		(Box::into_raw(self.bytes).cast::<u8>(), len)
	}

	/// Takes back ownership of a block given up by
	/// [`MarshalledBlock::into_raw`].
	///
	/// # Errors
	///
	/// Returns [`MarshalError::NullAddress`] if `address` is null, or
	/// [`MarshalError::ZeroSize`] if `len` is zero.
	///
	/// # Safety
	///
	/// A non-null `address` must have come from [`MarshalledBlock::into_raw`]
	/// along with `len`, and must not have been taken back already.
	pub unsafe fn from_raw(address: *mut u8, len: usize) -> Result<Self, MarshalError> {
		if address.is_null() {
			return Err(MarshalError::NullAddress);
		}

		if len == 0 {
			return Err(MarshalError::ZeroSize);
		}

		Ok(Self {
			bytes: Box::from_raw(ptr::slice_from_raw_parts_mut(address, len)),
		})
	}
}

impl MarshalledInt {
	/// Reads the value without releasing it.
	#[must_use]
	pub fn get(&self) -> c_int {
		self.value[0]
	}

	/// Gives up ownership of the integer, returning its heap address.
	///
	/// The integer must be recovered with [`MarshalledInt::from_raw`], or it is
	/// leaked.
	#[must_use]
	pub fn into_raw(self) -> *mut c_int {
		Box::into_raw(self.value).cast::<c_int>()
	}

	/// Takes back ownership of an integer given up by
	/// [`MarshalledInt::into_raw`].
	///
	/// # Errors
	///
	/// Returns [`MarshalError::NullAddress`] if `address` is null.
	///
	/// # Safety
	///
	/// A non-null `address` must have come from [`MarshalledInt::into_raw`],
	/// and must not have been taken back already.
	pub unsafe fn from_raw(address: *mut c_int) -> Result<Self, MarshalError> {
		if address.is_null() {
			tracing::error!("failed to demarshal integer value from across thread boundary");
			return Err(MarshalError::NullAddress);
		}

		Ok(Self {
			value: Box::from_raw(ptr::slice_from_raw_parts_mut(address, 1)),
		})
	}
}

/// Copies `source` onto the heap.
///
/// # Errors
///
/// Returns [`MarshalError::ZeroSize`] if `source` is empty, or
/// [`MarshalError::OutOfMemory`] if the heap couldn't hold the copy.
#[tracing::instrument(level = "debug", skip_all, fields(size = source.len()))]
pub fn marshal_block(source: &[u8]) -> Result<MarshalledBlock, MarshalError> {
	let bytes = copy_to_heap(source)
		.inspect_err(|error| tracing::error!(%error, "failed to marshal block"))?;
	tracing::info!("block marshalled onto the heap");
	Ok(MarshalledBlock { bytes })
}

/// Copies `source` onto the heap so it can be handed to a new thread.
///
/// This is the same as [`marshal_block`]. The result is meant to be passed
/// to [`create_with`], and consumed on the other side.
///
/// # Errors
///
/// See [`marshal_block`].
///
/// [`create_with`]: `crate::create_with`
pub fn marshal_block_to_thread(source: &[u8]) -> Result<MarshalledBlock, MarshalError> {
	marshal_block(source)
}

/// Copies an integer onto the heap.
///
/// # Errors
///
/// Returns [`MarshalError::OutOfMemory`] if the heap couldn't hold it.
pub fn marshal_int(value: c_int) -> Result<MarshalledInt, MarshalError> {
	let value = copy_to_heap(&[value])
		.inspect_err(|error| tracing::error!(%error, "failed to marshal integer value"))?;
	Ok(MarshalledInt { value })
}

/// Reads a marshalled integer and releases its heap storage.
#[must_use]
pub fn demarshal_int(value: MarshalledInt) -> c_int {
	value.get()
}

/// Copies the first `size` bytes of `block` into `destination`, and releases
/// the block.
///
/// # Errors
///
/// Returns [`MarshalError::ZeroSize`] if `size` is zero, or
/// [`MarshalError::SizeOutOfRange`] if `size` is larger than the block or
/// the destination. The block is handed back untouched in the error.
#[tracing::instrument(level = "debug", skip(destination, block), fields(len = block.len()))]
pub fn demarshal_block_from_thread(
	destination: &mut [u8],
	block: MarshalledBlock,
	size: usize,
) -> Result<(), DemarshalError> {
	if size == 0 {
		tracing::error!("failed to demarshal data block: zero bytes requested");
		return Err(DemarshalError::new(block, MarshalError::ZeroSize));
	}

	let available = block.len().min(destination.len());
	if size > available {
		tracing::error!(available, "failed to demarshal data block: size out of range");
		return Err(DemarshalError::new(
			block,
			MarshalError::SizeOutOfRange {
				requested: size,
				available,
			},
		));
	}

	destination[..size].copy_from_slice(&block.as_bytes()[..size]);
	tracing::info!("block demarshalled from the heap");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_blocks_are_rejected() {
		assert_eq!(marshal_block(&[]).unwrap_err(), MarshalError::ZeroSize);
		assert_eq!(marshal_block_to_thread(&[]).unwrap_err(), MarshalError::ZeroSize);
	}

	#[test]
	fn marshalled_block_is_a_copy() {
		let mut source = [7u8; 16];
		let block = marshal_block(&source).unwrap();
		source[0] = 0;

		assert_eq!(block.len(), 16);
		assert!(!block.is_empty());
		assert_eq!(block.as_bytes(), &[7u8; 16]);
		assert_ne!(block.as_ptr(), source.as_ptr());
	}

	#[test]
	fn marshal_int_round_trips() {
		let value = marshal_int(42).unwrap();
		assert_eq!(value.get(), 42);
		assert_eq!(demarshal_int(value), 42);
	}

	#[test]
	fn null_int_address_is_an_argument_error() {
		let result = unsafe { MarshalledInt::from_raw(ptr::null_mut()) };
		assert_eq!(result.unwrap_err(), MarshalError::NullAddress);
	}

	#[test]
	fn null_block_address_is_an_argument_error() {
		let result = unsafe { MarshalledBlock::from_raw(ptr::null_mut(), 8) };
		assert_eq!(result.unwrap_err(), MarshalError::NullAddress);
	}

	#[test]
	fn zero_length_raw_block_is_an_argument_error() {
		let mut byte = 0u8;
		let result = unsafe { MarshalledBlock::from_raw(&mut byte, 0) };
		assert_eq!(result.unwrap_err(), MarshalError::ZeroSize);
	}

	#[test]
	fn int_survives_an_opaque_pointer() {
		let address = marshal_int(-5).unwrap().into_raw();
		assert_eq!(address as usize % mem::align_of::<c_int>(), 0);

		let value = unsafe { MarshalledInt::from_raw(address) }.unwrap();
		assert_eq!(demarshal_int(value), -5);
	}

	#[test]
	fn block_survives_an_opaque_pointer() {
		let (address, len) = marshal_block(b"abc").unwrap().into_raw();
		let block = unsafe { MarshalledBlock::from_raw(address, len) }.unwrap();
		assert_eq!(&*block.into_bytes(), b"abc");
	}

	#[test]
	fn zero_size_demarshal_gives_the_block_back() {
		let block = marshal_block(&[1, 2]).unwrap();
		let mut destination = [0; 2];

		let error = demarshal_block_from_thread(&mut destination, block, 0).unwrap_err();
		assert_eq!(error.kind(), MarshalError::ZeroSize);
		assert_eq!(error.into_block().as_bytes(), &[1, 2]);
		assert_eq!(destination, [0, 0]);
	}

	#[test]
	fn oversized_demarshal_gives_the_block_back() {
		let block = marshal_block(&[1, 2, 3, 4]).unwrap();
		let mut destination = [0; 2];

		let error = demarshal_block_from_thread(&mut destination, block, 3).unwrap_err();
		assert_eq!(
			error.kind(),
			MarshalError::SizeOutOfRange {
				requested: 3,
				available: 2,
			}
		);
		assert_eq!(error.into_block().len(), 4);
	}

	#[test]
	fn partial_demarshal_copies_only_the_prefix() {
		let block = marshal_block(&[9, 8, 7]).unwrap();
		let mut destination = [0; 3];

		demarshal_block_from_thread(&mut destination, block, 2).unwrap();
		assert_eq!(destination, [9, 8, 0]);
	}
}
