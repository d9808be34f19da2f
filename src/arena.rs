use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use log::debug;

use crate::{align::is_power_of_two, block::MemBlock, error::ConfigError};

/// Fixed-capacity, aligned backing storage for the arena allocators.
///
/// The buffer lives on the heap, so moving the owning allocator never
/// invalidates blocks carved out of it.
#[derive(Debug)]
pub(crate) struct ArenaBuffer {
  start: NonNull<u8>,
  layout: Layout,
}

impl ArenaBuffer {
  pub(crate) fn new(
    capacity: usize,
    alignment: usize,
  ) -> Result<Self, ConfigError> {
    if !is_power_of_two(alignment) {
      return Err(ConfigError::AlignmentNotPowerOfTwo(alignment));
    }
    if capacity == 0 {
      return Err(ConfigError::BufferTooSmall {
        capacity,
        minimum: 1,
      });
    }

    let layout = Layout::from_size_align(capacity, alignment)
      .map_err(|_| ConfigError::BufferAllocation { capacity, alignment })?;

    // SAFETY: layout has a non-zero size.
    let start = NonNull::new(unsafe { alloc::alloc(layout) })
      .ok_or(ConfigError::BufferAllocation { capacity, alignment })?;

    debug!(
      "reserved arena buffer of {} bytes at {:p} (align {})",
      capacity, start, alignment
    );

    Ok(Self { start, layout })
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    self.layout.size()
  }

  #[inline]
  pub(crate) fn alignment(&self) -> usize {
    self.layout.align()
  }

  #[inline]
  pub(crate) fn start(&self) -> *mut u8 {
    self.start.as_ptr()
  }

  /// Block covering `len` bytes at `offset` into the buffer.
  #[inline]
  pub(crate) fn block_at(
    &self,
    offset: usize,
    len: usize,
  ) -> MemBlock {
    debug_assert!(offset + len <= self.capacity());
    // SAFETY: offset stays within (or one past) the buffer.
    MemBlock::new(unsafe { self.start().add(offset) }, len)
  }

  /// Offset of `block` into the buffer, if it starts inside it.
  #[inline]
  pub(crate) fn offset_of(
    &self,
    block: MemBlock,
  ) -> Option<usize> {
    let start = self.start() as usize;
    let addr = block.addr();

    if block.is_null() || addr < start || addr > start + self.capacity() {
      return None;
    }

    Some(addr - start)
  }
}

impl Drop for ArenaBuffer {
  fn drop(&mut self) {
    // SAFETY: allocated in `new` with this exact layout.
    unsafe { alloc::dealloc(self.start.as_ptr(), self.layout) }
  }
}
