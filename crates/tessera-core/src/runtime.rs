//! Collaborator interface for the device that owns real memory.

use crate::error::Result;
use std::fmt::Debug;
use std::ptr::NonNull;

/// A device runtime able to hand out and take back raw byte buffers.
///
/// The planner only ever asks for one buffer per allocator, sized to the
/// allocator's peak, and returns it with the same size.
pub trait Runtime: Debug + Send + Sync {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Allocate `nbytes` bytes, aligned to at least
    /// [`DataType::max_size_in_bytes`](crate::types::DataType::max_size_in_bytes).
    fn allocate(&self, nbytes: usize) -> Result<NonNull<u8>>;

    /// Release a buffer previously returned by [`Runtime::allocate`].
    fn deallocate(&self, ptr: NonNull<u8>, nbytes: usize);
}
