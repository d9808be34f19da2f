//! The contract every allocator in this crate implements.

use std::{alloc::Layout, cmp, mem, ptr::NonNull};

use crate::{block::MemBlock, error::AllocError};

/// Which alignment an allocator honors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
  /// Requests may ask for at most this power of two. Blocks are aligned to
  /// at least the request's own alignment; see each allocator for whether
  /// it rounds every block up to the full value.
  Fixed(usize),
  /// The caller's `Layout::align()` is honored per call.
  Runtime,
}

impl Alignment {
  pub const fn fixed(self) -> Option<usize> {
    match self {
      Alignment::Fixed(alignment) => Some(alignment),
      Alignment::Runtime => None,
    }
  }

  /// The alignment a call with `layout` will actually get.
  pub fn resolve(
    self,
    layout: Layout,
  ) -> Result<usize, AllocError> {
    match self {
      Alignment::Fixed(supported) if layout.align() > supported => {
        Err(AllocError::UnsupportedAlignment {
          requested: layout.align(),
          supported,
        })
      }
      Alignment::Fixed(supported) => Ok(supported),
      Alignment::Runtime => Ok(layout.align()),
    }
  }

  /// Alignment of a combinator built over two allocators.
  ///
  /// Two fixed alignments combine to the smaller one, which both sides
  /// honor. As soon as one side is runtime-aligned the pair is too: the
  /// caller's alignment is forwarded, and the fixed side refuses whatever
  /// it cannot honor so the other side gets a chance.
  pub fn combine(
    self,
    other: Alignment,
  ) -> Alignment {
    match (self, other) {
      (Alignment::Fixed(a), Alignment::Fixed(b)) => Alignment::Fixed(cmp::min(a, b)),
      _ => Alignment::Runtime,
    }
  }
}

/// Static description of what an allocator can do, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
  pub alignment: Alignment,
  /// `contains` gives a meaningful answer.
  pub ownership_aware: bool,
  /// [`MassFree::free_all`] is available.
  pub mass_free: bool,
}

/// Uniform allocation contract.
///
/// Failures are reported through `Err`; a block passed to a failed
/// `reallocate` is left untouched and still belongs to the allocator.
pub trait Allocator {
  fn capabilities(&self) -> Capabilities;

  /// Whether `block` was produced by this allocator. Allocators that are
  /// not [`OwnershipAware`] may answer `true` for anything.
  fn contains(
    &self,
    block: MemBlock,
  ) -> bool;

  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Result<MemBlock, AllocError>;

  /// Returns `block` to the allocator. Freeing [`MemBlock::EMPTY`] is a
  /// no-op.
  ///
  /// # Safety
  ///
  /// `block` must be empty or a live block produced by this allocator,
  /// exactly as it was returned.
  unsafe fn free(
    &mut self,
    block: MemBlock,
  );

  /// Resizes `block`, preserving the first `min(block.len, layout.size())`
  /// bytes. Reallocating [`MemBlock::EMPTY`] is an allocation.
  ///
  /// # Safety
  ///
  /// Same requirements on `block` as [`Allocator::free`]. On success the
  /// old block must no longer be used.
  unsafe fn reallocate(
    &mut self,
    block: MemBlock,
    layout: Layout,
  ) -> Result<MemBlock, AllocError>;
}

/// Marker for allocators whose `contains` can be trusted.
///
/// Required of the primary side of a
/// [`FallbackAllocator`](crate::FallbackAllocator).
pub trait OwnershipAware: Allocator {}

/// Allocators that can release everything they handed out in one call.
pub trait MassFree: Allocator {
  fn free_all(&mut self);
}

impl<A: Allocator + ?Sized> Allocator for &mut A {
  fn capabilities(&self) -> Capabilities {
    (**self).capabilities()
  }

  fn contains(
    &self,
    block: MemBlock,
  ) -> bool {
    (**self).contains(block)
  }

  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    (**self).allocate(layout)
  }

  unsafe fn free(
    &mut self,
    block: MemBlock,
  ) {
    unsafe { (**self).free(block) }
  }

  unsafe fn reallocate(
    &mut self,
    block: MemBlock,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    unsafe { (**self).reallocate(block, layout) }
  }
}

impl<A: OwnershipAware + ?Sized> OwnershipAware for &mut A {}

impl<A: MassFree + ?Sized> MassFree for &mut A {
  fn free_all(&mut self) {
    (**self).free_all()
  }
}

/// Allocates room for `len` values of `T` and returns it as a typed range.
///
/// The range covers every whole `T` that fits the usable length, so it may
/// be longer than `len`. The memory is uninitialized.
pub fn allocate_slice<T, A: Allocator + ?Sized>(
  allocator: &mut A,
  len: usize,
) -> Result<NonNull<[T]>, AllocError> {
  let layout = Layout::array::<T>(len).map_err(|_| AllocError::CapacityOverflow)?;

  if mem::size_of::<T>() == 0 {
    return Ok(NonNull::slice_from_raw_parts(NonNull::dangling(), len));
  }

  let block = allocator.allocate(layout)?;
  let data = NonNull::new(block.ptr as *mut T).ok_or(AllocError::OutOfMemory {
    size: layout.size(),
    align: layout.align(),
  })?;

  Ok(NonNull::slice_from_raw_parts(data, block.len / mem::size_of::<T>()))
}
