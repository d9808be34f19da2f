use std::alloc::Layout;

use log::trace;

use crate::{
  align::{MAX_ALIGN, checked_align_up},
  arena::ArenaBuffer,
  block::MemBlock,
  error::{AllocError, ConfigError},
  traits::{Alignment, Allocator, Capabilities, MassFree, OwnershipAware},
};

/// Fixed-capacity arena with a single cursor that only moves forward.
///
/// ```text
///   start                     cursor                           end
///     ┌──────┬──────┬──────────┬────────────────────────────────┐
///     │  A1  │  A2  │    A3    │          free space            │
///     └──────┴──────┴──────────┴────────────────────────────────┘
/// ```
///
/// Every block is rounded up to the arena alignment. Only the most recent
/// block can be freed or resized in place; everything else stays put until
/// [`MassFree::free_all`] resets the cursor.
#[derive(Debug)]
pub struct BumpAllocator {
  buffer: ArenaBuffer,
  cursor: usize,
}

impl BumpAllocator {
  /// `capacity` must be a multiple of the power-of-two `alignment`.
  pub fn new(
    capacity: usize,
    alignment: usize,
  ) -> Result<Self, ConfigError> {
    let buffer = ArenaBuffer::new(capacity, alignment)?;

    if capacity % alignment != 0 {
      return Err(ConfigError::CapacityNotMultiple { capacity, alignment });
    }

    Ok(Self { buffer, cursor: 0 })
  }

  pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
    Self::new(capacity, MAX_ALIGN)
  }

  pub fn alignment(&self) -> usize {
    self.buffer.alignment()
  }

  pub fn capacity(&self) -> usize {
    self.buffer.capacity()
  }

  pub fn used(&self) -> usize {
    self.cursor
  }

  pub fn remaining(&self) -> usize {
    self.capacity() - self.cursor
  }

  /// Start of the backing buffer.
  pub fn start(&self) -> *mut u8 {
    self.buffer.start()
  }

  fn is_topmost(
    &self,
    offset: usize,
    block: MemBlock,
  ) -> bool {
    offset + block.len == self.cursor
  }
}

impl Allocator for BumpAllocator {
  fn capabilities(&self) -> Capabilities {
    Capabilities {
      alignment: Alignment::Fixed(self.alignment()),
      ownership_aware: true,
      mass_free: true,
    }
  }

  fn contains(
    &self,
    block: MemBlock,
  ) -> bool {
    matches!(self.buffer.offset_of(block), Some(offset) if offset < self.cursor)
  }

  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    let align = self.capabilities().alignment.resolve(layout)?;
    let size = layout.size();

    // Zero-sized blocks still take a byte so `contains` can see them.
    let new_cursor = self
      .cursor
      .checked_add(size.max(1))
      .and_then(|end| checked_align_up(end, align))
      .ok_or(AllocError::CapacityOverflow)?;

    let required = new_cursor - self.cursor;

    if new_cursor > self.capacity() {
      trace!(
        "bump arena exhausted: {} bytes requested, {} of {} used",
        size,
        self.cursor,
        self.capacity()
      );
      return Err(AllocError::Exhausted {
        requested: size,
        required,
      });
    }

    let block = self.buffer.block_at(self.cursor, required);
    self.cursor = new_cursor;

    Ok(block)
  }

  unsafe fn free(
    &mut self,
    block: MemBlock,
  ) {
    let Some(offset) = self.buffer.offset_of(block) else {
      debug_assert!(block.is_null(), "bump arena asked to free foreign {block:?}");
      return;
    };

    if self.is_topmost(offset, block) {
      self.cursor = offset;
    }
  }

  unsafe fn reallocate(
    &mut self,
    block: MemBlock,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    if block.is_null() {
      return self.allocate(layout);
    }

    let align = self.capabilities().alignment.resolve(layout)?;

    let offset = match self.buffer.offset_of(block) {
      Some(offset) if self.is_topmost(offset, block) => offset,
      _ => return Err(AllocError::NotTopmost),
    };

    let new_cursor = offset
      .checked_add(layout.size().max(1))
      .and_then(|end| checked_align_up(end, align))
      .ok_or(AllocError::CapacityOverflow)?;

    if new_cursor > self.capacity() {
      return Err(AllocError::Exhausted {
        requested: layout.size(),
        required: new_cursor - offset,
      });
    }

    self.cursor = new_cursor;

    Ok(self.buffer.block_at(offset, new_cursor - offset))
  }
}

impl OwnershipAware for BumpAllocator {}

impl MassFree for BumpAllocator {
  fn free_all(&mut self) {
    self.cursor = 0;
  }
}
