use std::alloc::Layout;

use log::trace;

use crate::{
  align::{MAX_ALIGN, align_down, checked_align_up},
  arena::ArenaBuffer,
  block::MemBlock,
  error::{AllocError, ConfigError},
  traits::{Alignment, Allocator, Capabilities, MassFree, OwnershipAware},
};

/// Double-ended arena: `back` grows up from the start like a bump
/// allocator, `front` grows down from the end and only serves requests
/// the back region can no longer fit.
///
/// ```text
///   start              back                 front                end
///     ┌──────┬──────────┬────────────────────┬──────┬─────────────┐
///     │  B1  │    B2    │        gap         │  F2  │     F1      │
///     └──────┴──────────┴────────────────────┴──────┴─────────────┘
/// ```
///
/// Back blocks are rounded up to the arena alignment. Front blocks are
/// carved at the request's exact size and aligned only to the request's
/// own alignment, which is what lets them use slack the back region
/// cannot. `back <= front` holds at all times.
#[derive(Debug)]
pub struct StackAllocator {
  buffer: ArenaBuffer,
  back: usize,
  front: usize,
}

impl StackAllocator {
  /// Unlike [`BumpAllocator`](crate::BumpAllocator), `capacity` need not be
  /// a multiple of `alignment`; the unaligned tail is only reachable from
  /// the front.
  pub fn new(
    capacity: usize,
    alignment: usize,
  ) -> Result<Self, ConfigError> {
    let buffer = ArenaBuffer::new(capacity, alignment)?;

    Ok(Self {
      back: 0,
      front: buffer.capacity(),
      buffer,
    })
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

  pub fn start(&self) -> *mut u8 {
    self.buffer.start()
  }

  /// Offset of the back cursor from the start of the buffer.
  pub fn back(&self) -> usize {
    self.back
  }

  /// Offset of the front cursor from the start of the buffer.
  pub fn front(&self) -> usize {
    self.front
  }

  pub fn used(&self) -> usize {
    self.back + (self.capacity() - self.front)
  }

  pub fn remaining(&self) -> usize {
    self.front - self.back
  }

  fn allocate_front(
    &mut self,
    layout: Layout,
  ) -> Option<MemBlock> {
    let start = self.front.checked_sub(layout.size().max(1))?;
    let start = align_down(start, layout.align());

    if start < self.back {
      return None;
    }

    let block = self.buffer.block_at(start, self.front - start);
    self.front = start;

    Some(block)
  }
}

impl Allocator for StackAllocator {
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
    match self.buffer.offset_of(block) {
      Some(offset) => offset < self.back || (self.front <= offset && offset < self.capacity()),
      None => false,
    }
  }

  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    let align = self.capabilities().alignment.resolve(layout)?;
    let size = layout.size();

    // Zero-sized blocks still take a byte so `contains` can see them.
    let new_back = self
      .back
      .checked_add(size.max(1))
      .and_then(|end| checked_align_up(end, align))
      .ok_or(AllocError::CapacityOverflow)?;

    if new_back <= self.front {
      let block = self.buffer.block_at(self.back, new_back - self.back);
      self.back = new_back;
      return Ok(block);
    }

    if let Some(block) = self.allocate_front(layout) {
      trace!(
        "stack arena served {} bytes from the front, front now at {}",
        size, self.front
      );
      return Ok(block);
    }

    trace!(
      "stack arena exhausted: {} bytes requested, back {} front {}",
      size, self.back, self.front
    );
    Err(AllocError::Exhausted {
      requested: size,
      required: new_back - self.back,
    })
  }

  unsafe fn free(
    &mut self,
    block: MemBlock,
  ) {
    let Some(offset) = self.buffer.offset_of(block) else {
      debug_assert!(block.is_null(), "stack arena asked to free foreign {block:?}");
      return;
    };

    if offset + block.len == self.back {
      self.back = offset;
    } else if offset == self.front {
      self.front = offset + block.len;
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
      Some(offset) if offset + block.len == self.back => offset,
      _ => return Err(AllocError::NotTopmost),
    };

    let new_back = offset
      .checked_add(layout.size().max(1))
      .and_then(|end| checked_align_up(end, align))
      .ok_or(AllocError::CapacityOverflow)?;

    if new_back > self.front {
      return Err(AllocError::Exhausted {
        requested: layout.size(),
        required: new_back - offset,
      });
    }

    self.back = new_back;

    Ok(self.buffer.block_at(offset, new_back - offset))
  }
}

impl OwnershipAware for StackAllocator {}

impl MassFree for StackAllocator {
  fn free_all(&mut self) {
    self.back = 0;
    self.front = self.capacity();
  }
}
