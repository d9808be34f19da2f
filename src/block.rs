use std::{cmp, ptr};

/// A contiguous byte range handed out by an allocator.
///
/// `len` is the *usable* size, which may be larger than what was asked
/// for. A null `ptr` means "no storage".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemBlock {
  pub ptr: *mut u8,
  pub len: usize,
}

impl MemBlock {
  pub const EMPTY: MemBlock = MemBlock {
    ptr: ptr::null_mut(),
    len: 0,
  };

  pub const fn new(
    ptr: *mut u8,
    len: usize,
  ) -> Self {
    Self { ptr, len }
  }

  #[inline]
  pub fn is_null(&self) -> bool {
    self.ptr.is_null()
  }

  #[inline]
  pub fn addr(&self) -> usize {
    self.ptr as usize
  }

  /// One past the last usable byte.
  #[inline]
  pub fn end(&self) -> *mut u8 {
    self.ptr.wrapping_add(self.len)
  }

  #[inline]
  pub fn end_addr(&self) -> usize {
    self.addr() + self.len
  }

  /// Copies the common prefix of `self` into `dst` and returns how many
  /// bytes were copied.
  ///
  /// # Safety
  ///
  /// Both blocks must be live, valid for their full length and must not
  /// overlap.
  pub unsafe fn copy_prefix_to(
    &self,
    dst: MemBlock,
  ) -> usize {
    let count = cmp::min(self.len, dst.len);
    if count != 0 {
      unsafe { ptr::copy_nonoverlapping(self.ptr, dst.ptr, count) };
    }
    count
  }
}

impl Default for MemBlock {
  fn default() -> Self {
    Self::EMPTY
  }
}
