#![allow(dead_code)]

use std::alloc::Layout;

use blockalloc::{AllocError, Allocator, Capabilities, MassFree, MemBlock, OwnershipAware};

pub fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

pub fn bytes(size: usize) -> Layout {
  Layout::array::<u8>(size).unwrap()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
  pub allocate: usize,
  pub free: usize,
  pub reallocate: usize,
  pub contains: usize,
}

/// Wraps an allocator and counts every call made through it.
#[derive(Debug)]
pub struct CountingAllocator<A> {
  pub inner: A,
  pub calls: std::cell::Cell<Calls>,
}

impl<A> CountingAllocator<A> {
  pub fn new(inner: A) -> Self {
    Self {
      inner,
      calls: Default::default(),
    }
  }

  pub fn calls(&self) -> Calls {
    self.calls.get()
  }

  fn bump(
    &self,
    update: impl FnOnce(&mut Calls),
  ) {
    let mut calls = self.calls.get();
    update(&mut calls);
    self.calls.set(calls);
  }
}

impl<A: Allocator> Allocator for CountingAllocator<A> {
  fn capabilities(&self) -> Capabilities {
    self.inner.capabilities()
  }

  fn contains(
    &self,
    block: MemBlock,
  ) -> bool {
    self.bump(|c| c.contains += 1);
    self.inner.contains(block)
  }

  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    self.bump(|c| c.allocate += 1);
    self.inner.allocate(layout)
  }

  unsafe fn free(
    &mut self,
    block: MemBlock,
  ) {
    self.bump(|c| c.free += 1);
    unsafe { self.inner.free(block) }
  }

  unsafe fn reallocate(
    &mut self,
    block: MemBlock,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    self.bump(|c| c.reallocate += 1);
    unsafe { self.inner.reallocate(block, layout) }
  }
}

impl<A: OwnershipAware> OwnershipAware for CountingAllocator<A> {}

impl<A: MassFree> MassFree for CountingAllocator<A> {
  fn free_all(&mut self) {
    self.inner.free_all()
  }
}
