use std::alloc::Layout;

use crate::{
  block::MemBlock,
  error::AllocError,
  traits::{Alignment, Allocator, Capabilities, MassFree, OwnershipAware},
};

/// An allocator that never allocates.
///
/// Useful as the spare side of a [`FallbackAllocator`](crate::FallbackAllocator)
/// or anywhere generic code needs "no allocation" to type-check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullAllocator;

impl NullAllocator {
  pub const fn new() -> Self {
    Self
  }
}

impl Allocator for NullAllocator {
  fn capabilities(&self) -> Capabilities {
    Capabilities {
      alignment: Alignment::Runtime,
      ownership_aware: true,
      mass_free: true,
    }
  }

  fn contains(
    &self,
    block: MemBlock,
  ) -> bool {
    block.is_null()
  }

  fn allocate(
    &mut self,
    _layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    Err(AllocError::Null)
  }

  unsafe fn free(
    &mut self,
    block: MemBlock,
  ) {
    debug_assert!(block.is_null(), "null allocator asked to free {block:?}");
  }

  unsafe fn reallocate(
    &mut self,
    _block: MemBlock,
    _layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    Err(AllocError::Null)
  }
}

impl OwnershipAware for NullAllocator {}

impl MassFree for NullAllocator {
  fn free_all(&mut self) {}
}
