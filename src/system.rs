//! Allocators that forward to the process heap.
//!
//! The heap primitives are injected as plain function pointers so tests
//! (or embedders with their own heap) can swap them out. The defaults are
//! libc's `malloc` family.

use std::{alloc::Layout, fmt, mem, ptr};

use libc::c_void;
use log::trace;

use crate::{
  align,
  align::MAX_ALIGN,
  block::MemBlock,
  error::AllocError,
  traits::{Alignment, Allocator, Capabilities},
};

/// Heap primitives for [`SystemAllocator`].
#[derive(Clone, Copy)]
pub struct HeapFns {
  pub alloc: unsafe fn(usize) -> *mut u8,
  pub free: unsafe fn(*mut u8),
  /// When absent, reallocation is emulated with alloc + copy + free.
  pub realloc: Option<unsafe fn(*mut u8, usize) -> *mut u8>,
}

impl HeapFns {
  pub const LIBC: HeapFns = HeapFns {
    alloc: libc_malloc,
    free: libc_free,
    realloc: Some(libc_realloc),
  };
}

impl fmt::Debug for HeapFns {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("HeapFns")
      .field("native_realloc", &self.realloc.is_some())
      .finish()
  }
}

/// Heap primitives for [`AlignedSystemAllocator`]; every call carries the
/// alignment.
#[derive(Clone, Copy)]
pub struct AlignedHeapFns {
  pub alloc: unsafe fn(usize, usize) -> *mut u8,
  pub free: unsafe fn(*mut u8),
  pub realloc: Option<unsafe fn(*mut u8, usize, usize) -> *mut u8>,
}

impl AlignedHeapFns {
  /// `posix_memalign` + `free`. libc has no aligned realloc, so that one
  /// is emulated.
  pub const LIBC: AlignedHeapFns = AlignedHeapFns {
    alloc: libc_memalign,
    free: libc_free,
    realloc: None,
  };
}

impl fmt::Debug for AlignedHeapFns {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("AlignedHeapFns")
      .field("native_realloc", &self.realloc.is_some())
      .finish()
  }
}

unsafe fn libc_malloc(size: usize) -> *mut u8 {
  unsafe { libc::malloc(size) as *mut u8 }
}

unsafe fn libc_free(ptr: *mut u8) {
  unsafe { libc::free(ptr as *mut c_void) }
}

unsafe fn libc_realloc(
  ptr: *mut u8,
  size: usize,
) -> *mut u8 {
  unsafe { libc::realloc(ptr as *mut c_void, size) as *mut u8 }
}

unsafe fn libc_memalign(
  size: usize,
  alignment: usize,
) -> *mut u8 {
  // posix_memalign wants a multiple of the pointer size.
  let alignment = align!(alignment);
  let mut out: *mut c_void = ptr::null_mut();

  match unsafe { libc::posix_memalign(&mut out, alignment, size) } {
    0 => out as *mut u8,
    _ => ptr::null_mut(),
  }
}

/// Wraps the platform heap; blocks are aligned to [`MAX_ALIGN`].
///
/// Not ownership-aware: `contains` answers `true` for everything, so this
/// can only be the spare side of a fallback.
#[derive(Debug, Clone, Copy)]
pub struct SystemAllocator {
  fns: HeapFns,
}

impl SystemAllocator {
  pub const fn new() -> Self {
    Self { fns: HeapFns::LIBC }
  }

  pub const fn with_fns(fns: HeapFns) -> Self {
    Self { fns }
  }

  pub fn fns(&self) -> &HeapFns {
    &self.fns
  }
}

impl Default for SystemAllocator {
  fn default() -> Self {
    Self::new()
  }
}

impl Allocator for SystemAllocator {
  fn capabilities(&self) -> Capabilities {
    Capabilities {
      alignment: Alignment::Fixed(MAX_ALIGN),
      ownership_aware: false,
      mass_free: false,
    }
  }

  fn contains(
    &self,
    _block: MemBlock,
  ) -> bool {
    true
  }

  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    let align = self.capabilities().alignment.resolve(layout)?;
    let ptr = unsafe { (self.fns.alloc)(layout.size().max(1)) };

    if ptr.is_null() {
      trace!("system heap refused {} bytes", layout.size());
      return Err(AllocError::OutOfMemory {
        size: layout.size(),
        align,
      });
    }

    Ok(MemBlock::new(ptr, layout.size()))
  }

  unsafe fn free(
    &mut self,
    block: MemBlock,
  ) {
    if !block.is_null() {
      unsafe { (self.fns.free)(block.ptr) }
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
    let size = layout.size();

    match self.fns.realloc {
      Some(realloc) => {
        let ptr = unsafe { realloc(block.ptr, size.max(1)) };
        if ptr.is_null() {
          return Err(AllocError::OutOfMemory { size, align });
        }
        Ok(MemBlock::new(ptr, size))
      }
      None => {
        let fresh = self.allocate(layout)?;
        unsafe {
          block.copy_prefix_to(fresh);
          self.free(block);
        }
        Ok(fresh)
      }
    }
  }
}

/// Wraps an alignment-aware heap; honors the caller's alignment per call.
#[derive(Debug, Clone, Copy)]
pub struct AlignedSystemAllocator {
  fns: AlignedHeapFns,
}

impl AlignedSystemAllocator {
  pub const fn new() -> Self {
    Self {
      fns: AlignedHeapFns::LIBC,
    }
  }

  pub const fn with_fns(fns: AlignedHeapFns) -> Self {
    Self { fns }
  }
}

impl Default for AlignedSystemAllocator {
  fn default() -> Self {
    Self::new()
  }
}

impl Allocator for AlignedSystemAllocator {
  fn capabilities(&self) -> Capabilities {
    Capabilities {
      alignment: Alignment::Runtime,
      ownership_aware: false,
      mass_free: false,
    }
  }

  fn contains(
    &self,
    _block: MemBlock,
  ) -> bool {
    true
  }

  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    let align = layout.align().max(mem::align_of::<usize>());
    let ptr = unsafe { (self.fns.alloc)(layout.size().max(1), align) };

    if ptr.is_null() {
      trace!(
        "aligned heap refused {} bytes at align {}",
        layout.size(),
        align
      );
      return Err(AllocError::OutOfMemory {
        size: layout.size(),
        align,
      });
    }

    Ok(MemBlock::new(ptr, layout.size()))
  }

  unsafe fn free(
    &mut self,
    block: MemBlock,
  ) {
    if !block.is_null() {
      unsafe { (self.fns.free)(block.ptr) }
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

    match self.fns.realloc {
      Some(realloc) => {
        let align = layout.align().max(mem::align_of::<usize>());
        let ptr = unsafe { realloc(block.ptr, layout.size().max(1), align) };
        if ptr.is_null() {
          return Err(AllocError::OutOfMemory {
            size: layout.size(),
            align,
          });
        }
        Ok(MemBlock::new(ptr, layout.size()))
      }
      None => {
        let fresh = self.allocate(layout)?;
        unsafe {
          block.copy_prefix_to(fresh);
          self.free(block);
        }
        Ok(fresh)
      }
    }
  }
}
