use std::alloc::Layout;

use log::{debug, trace};

use crate::{
  block::MemBlock,
  error::AllocError,
  traits::{Alignment, Allocator, Capabilities, MassFree, OwnershipAware},
};

/// Tries `main` first and retries on `spare` when it refuses.
///
/// `main` must be [`OwnershipAware`] so frees and reallocations can be
/// routed back to whichever side produced the block.
///
/// ```text
///                 allocate(layout)
///                        │
///                        ▼
///               ┌─────────────────┐   Ok
///               │      main       │ ──────► block
///               └─────────────────┘
///                        │ Err
///                        ▼
///               ┌─────────────────┐
///               │      spare      │ ──────► block / Err
///               └─────────────────┘
/// ```
///
/// Growing a block that `main` cannot extend in place migrates it to
/// `spare`: the new block is obtained first, the prefix copied, and only
/// then is the old block released from `main`.
#[derive(Debug)]
pub struct FallbackAllocator<M, S> {
  main: M,
  spare: S,
  capabilities: Capabilities,
}

impl<M: OwnershipAware, S: Allocator> FallbackAllocator<M, S> {
  pub fn new(
    main: M,
    spare: S,
  ) -> Self {
    let main_caps = main.capabilities();
    let spare_caps = spare.capabilities();

    debug_assert!(main_caps.ownership_aware);

    let capabilities = Capabilities {
      alignment: main_caps.alignment.combine(spare_caps.alignment),
      ownership_aware: spare_caps.ownership_aware,
      mass_free: main_caps.mass_free && spare_caps.mass_free,
    };

    debug!("fallback allocator assembled with {:?}", capabilities);

    Self {
      main,
      spare,
      capabilities,
    }
  }

  pub fn main(&self) -> &M {
    &self.main
  }

  pub fn spare(&self) -> &S {
    &self.spare
  }

  pub fn into_parts(self) -> (M, S) {
    (self.main, self.spare)
  }

  /// With both sides fixed, over-aligned requests are refused up front and
  /// the rest are lifted to the common alignment. Otherwise the caller's
  /// layout goes through untouched.
  fn request(
    &self,
    layout: Layout,
  ) -> Result<Layout, AllocError> {
    match self.capabilities.alignment {
      Alignment::Fixed(align) => {
        self.capabilities.alignment.resolve(layout)?;
        layout.align_to(align).map_err(|_| AllocError::CapacityOverflow)
      }
      Alignment::Runtime => Ok(layout),
    }
  }
}

impl<M: OwnershipAware, S: Allocator> Allocator for FallbackAllocator<M, S> {
  fn capabilities(&self) -> Capabilities {
    self.capabilities
  }

  fn contains(
    &self,
    block: MemBlock,
  ) -> bool {
    self.main.contains(block) || self.spare.contains(block)
  }

  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    let layout = self.request(layout)?;

    match self.main.allocate(layout) {
      Ok(block) => Ok(block),
      Err(err) => {
        trace!("main allocator refused {} bytes ({}), trying spare", layout.size(), err);
        self.spare.allocate(layout)
      }
    }
  }

  unsafe fn free(
    &mut self,
    block: MemBlock,
  ) {
    if block.is_null() {
      return;
    }

    unsafe {
      if self.main.contains(block) {
        self.main.free(block)
      } else {
        self.spare.free(block)
      }
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

    let layout = self.request(layout)?;

    if !self.main.contains(block) {
      return unsafe { self.spare.reallocate(block, layout) };
    }

    match unsafe { self.main.reallocate(block, layout) } {
      Ok(grown) => Ok(grown),
      Err(err) => {
        trace!("main allocator cannot resize {:?} ({}), migrating to spare", block, err);

        let fresh = self.spare.allocate(layout)?;
        unsafe {
          block.copy_prefix_to(fresh);
          self.main.free(block);
        }

        Ok(fresh)
      }
    }
  }
}

impl<M: OwnershipAware, S: OwnershipAware> OwnershipAware for FallbackAllocator<M, S> {}

impl<M: OwnershipAware + MassFree, S: MassFree> MassFree for FallbackAllocator<M, S> {
  fn free_all(&mut self) {
    self.main.free_all();
    self.spare.free_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    AlignedSystemAllocator, BumpAllocator, FreeListAllocator, NullAllocator, StackAllocator,
    SystemAllocator,
  };

  fn bytes(size: usize) -> Layout {
    Layout::array::<u8>(size).unwrap()
  }

  #[test]
  fn small_requests_stay_on_main() {
    let mut allocator = FallbackAllocator::new(
      BumpAllocator::new(64, 8).unwrap(),
      BumpAllocator::new(256, 8).unwrap(),
    );

    let block = allocator.allocate(bytes(32)).unwrap();

    assert!(allocator.main().contains(block));
    assert!(!allocator.spare().contains(block));
    assert_eq!(allocator.spare().used(), 0);
  }

  #[test]
  fn large_requests_go_to_spare() {
    let mut allocator = FallbackAllocator::new(
      BumpAllocator::new(64, 8).unwrap(),
      BumpAllocator::new(256, 8).unwrap(),
    );

    let block = allocator.allocate(bytes(100)).unwrap();

    assert!(!allocator.main().contains(block));
    assert!(allocator.spare().contains(block));
    assert_eq!(allocator.main().used(), 0);
  }

  #[test]
  fn free_routes_to_owner() {
    let mut allocator = FallbackAllocator::new(
      BumpAllocator::new(64, 8).unwrap(),
      BumpAllocator::new(256, 8).unwrap(),
    );

    let on_main = allocator.allocate(bytes(16)).unwrap();
    let on_spare = allocator.allocate(bytes(128)).unwrap();

    unsafe {
      allocator.free(on_spare);
      allocator.free(on_main);
    }

    assert_eq!(allocator.main().used(), 0);
    assert_eq!(allocator.spare().used(), 0);
  }

  #[test]
  fn realloc_migrates_to_spare_when_main_is_full() {
    let mut allocator = FallbackAllocator::new(
      BumpAllocator::new(32, 8).unwrap(),
      BumpAllocator::new(256, 8).unwrap(),
    );

    let block = allocator.allocate(bytes(16)).unwrap();
    unsafe { block.ptr.write_bytes(0xC3, 16) };

    let grown = unsafe { allocator.reallocate(block, bytes(64)) }.unwrap();

    assert!(allocator.spare().contains(grown));
    assert!(!allocator.main().contains(block));
    assert_eq!(allocator.main().used(), 0);
    assert_eq!(unsafe { std::slice::from_raw_parts(grown.ptr, 16) }, &[0xC3; 16]);
  }

  #[test]
  fn failed_migration_keeps_block_on_main() {
    let mut allocator = FallbackAllocator::new(BumpAllocator::new(32, 8).unwrap(), NullAllocator);

    let block = allocator.allocate(bytes(16)).unwrap();
    let result = unsafe { allocator.reallocate(block, bytes(64)) };

    assert_eq!(result, Err(AllocError::Null));
    assert!(allocator.main().contains(block));
    assert_eq!(allocator.main().used(), 16);
  }

  #[test]
  fn spare_owned_block_is_reallocated_by_spare() {
    let mut allocator = FallbackAllocator::new(
      BumpAllocator::new(32, 8).unwrap(),
      BumpAllocator::new(256, 8).unwrap(),
    );

    let block = allocator.allocate(bytes(64)).unwrap();
    let grown = unsafe { allocator.reallocate(block, bytes(128)) }.unwrap();

    assert_eq!(grown.ptr, block.ptr);
    assert_eq!(allocator.spare().used(), 128);
    assert_eq!(allocator.main().used(), 0);
  }

  #[test]
  fn capabilities_combine() {
    let both_fixed = FallbackAllocator::new(
      BumpAllocator::new(64, 8).unwrap(),
      StackAllocator::new(64, 32).unwrap(),
    );
    assert_eq!(
      both_fixed.capabilities(),
      Capabilities {
        alignment: Alignment::Fixed(8),
        ownership_aware: true,
        mass_free: true,
      }
    );

    let heap_spare = FallbackAllocator::new(BumpAllocator::new(64, 8).unwrap(), SystemAllocator::new());
    assert!(!heap_spare.capabilities().ownership_aware);
    assert!(!heap_spare.capabilities().mass_free);

    let runtime = FallbackAllocator::new(NullAllocator, AlignedSystemAllocator::new());
    assert_eq!(runtime.capabilities().alignment, Alignment::Runtime);

    let mixed = FallbackAllocator::new(BumpAllocator::new(64, 8).unwrap(), AlignedSystemAllocator::new());
    assert_eq!(mixed.capabilities().alignment, Alignment::Runtime);
  }

  #[test]
  fn runtime_side_receives_callers_alignment() {
    let mut allocator = FallbackAllocator::new(
      BumpAllocator::new(64, 8).unwrap(),
      AlignedSystemAllocator::new(),
    );

    let small = allocator.allocate(Layout::from_size_align(8, 8).unwrap()).unwrap();
    assert!(allocator.main().contains(small));

    let wide = allocator.allocate(Layout::from_size_align(8, 64).unwrap()).unwrap();
    assert!(!allocator.main().contains(wide));
    assert_eq!(wide.addr() % 64, 0);
    assert_eq!(allocator.main().used(), 8);

    unsafe {
      allocator.free(wide);
      allocator.free(small);
    }
    assert_eq!(allocator.main().used(), 0);
  }

  #[test]
  fn zero_sized_block_is_routed_back_to_main() {
    let mut allocator = FallbackAllocator::new(
      BumpAllocator::new(64, 8).unwrap(),
      StackAllocator::new(64, 8).unwrap(),
    );

    allocator.allocate(bytes(16)).unwrap();
    let empty = allocator.allocate(bytes(0)).unwrap();

    assert!(!empty.is_null());
    assert!(empty.len >= 1);
    assert!(allocator.main().contains(empty));
    assert!(!allocator.spare().contains(empty));

    unsafe { allocator.free(empty) };
    assert_eq!(allocator.main().used(), 16);
    assert_eq!(allocator.spare().used(), 0);

    let empty = allocator.allocate(bytes(0)).unwrap();
    let grown = unsafe { allocator.reallocate(empty, bytes(24)) }.unwrap();
    assert_eq!(grown.ptr, empty.ptr);
    assert_eq!(allocator.main().used(), 40);
    assert_eq!(allocator.spare().used(), 0);
  }

  #[test]
  fn over_aligned_request_is_rejected_up_front() {
    let mut allocator = FallbackAllocator::new(
      BumpAllocator::new(64, 8).unwrap(),
      BumpAllocator::new(64, 16).unwrap(),
    );

    assert_eq!(
      allocator.allocate(Layout::from_size_align(8, 16).unwrap()),
      Err(AllocError::UnsupportedAlignment {
        requested: 16,
        supported: 8
      })
    );
  }

  #[test]
  fn nested_fallbacks_route_frees() {
    let inner = FallbackAllocator::new(
      BumpAllocator::new(32, 8).unwrap(),
      FreeListAllocator::new(BumpAllocator::new(128, 8).unwrap()).unwrap(),
    );
    let mut allocator = FallbackAllocator::new(inner, SystemAllocator::new());

    let first = allocator.allocate(bytes(32)).unwrap();
    let second = allocator.allocate(bytes(64)).unwrap();
    let third = allocator.allocate(bytes(512)).unwrap();

    assert!(allocator.main().main().contains(first));
    assert!(allocator.main().spare().backing().contains(second));
    assert!(!allocator.main().contains(third));

    unsafe {
      allocator.free(second);
      allocator.free(third);
    }

    assert_eq!(allocator.main().spare().free_nodes(), 1);
    assert_eq!(allocator.allocate(bytes(64)).unwrap(), second);
  }

  #[test]
  fn free_all_releases_both_sides() {
    let mut allocator = FallbackAllocator::new(
      BumpAllocator::new(32, 8).unwrap(),
      StackAllocator::new(64, 8).unwrap(),
    );

    allocator.allocate(bytes(32)).unwrap();
    allocator.allocate(bytes(32)).unwrap();

    allocator.free_all();

    assert_eq!(allocator.main().used(), 0);
    assert_eq!(allocator.spare().used(), 0);
  }
}
