use core::fmt;
use std::error::Error;

use super::MarshalledBlock;

/// An error which can occur while marshalling or demarshalling a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MarshalError {
	/// A required address was null.
	#[error("failed to marshal data: the address is null")]
	NullAddress,
	/// A block of zero bytes was requested.
	#[error("a positive size must be given for a marshalled block")]
	ZeroSize,
	/// The requested size doesn't fit in the source or the destination.
	#[error("{requested} bytes were requested, but only {available} are available")]
	SizeOutOfRange { requested: usize, available: usize },
	/// The heap couldn't hold a copy of the block.
	#[error("failed to marshal a {size} byte block onto the heap")]
	OutOfMemory { size: usize },
}

/// The error returned when a block couldn't be demarshalled.
///
/// Nothing was copied, and the block is still valid. It can be recovered
/// with [`DemarshalError::into_block`].
pub struct DemarshalError {
	block: MarshalledBlock,
	kind: MarshalError,
}

impl fmt::Debug for DemarshalError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DemarshalError")
			.field("kind", &self.kind)
			.finish_non_exhaustive()
	}
}

impl fmt::Display for DemarshalError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "failed to demarshal data block: {}", self.kind)
	}
}

impl Error for DemarshalError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		Some(&self.kind)
	}
}

impl DemarshalError {
	pub(crate) fn new(block: MarshalledBlock, kind: MarshalError) -> Self {
		Self { block, kind }
	}

	#[must_use]
	pub const fn kind(&self) -> MarshalError {
		self.kind
	}

	/// Takes back the block that couldn't be demarshalled.
	#[must_use]
	pub fn into_block(self) -> MarshalledBlock {
		self.block
	}
}
