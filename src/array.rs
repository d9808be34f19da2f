use std::{
  alloc::Layout,
  cmp, fmt,
  marker::PhantomData,
  mem,
  ops::{Deref, DerefMut},
  ptr::{self, NonNull},
  slice,
};

use log::trace;

use crate::{block::MemBlock, error::AllocError, traits::Allocator};

/// Growable array whose storage comes from any [`Allocator`].
///
/// The array owns one block of its allocator. It grows through
/// [`Allocator::reallocate`], so arena allocators can extend it in place
/// while it is their topmost block. Every fallible operation either
/// succeeds or leaves the array exactly as it was.
///
/// `A` can be an allocator by value or a `&mut` borrow of one.
pub struct DynArray<T, A: Allocator> {
  block: MemBlock,
  len: usize,
  allocator: A,
  _marker: PhantomData<T>,
}

impl<T, A: Allocator> DynArray<T, A> {
  /// Capacity requested the first time the array grows.
  const MIN_CAPACITY: usize = match mem::size_of::<T>() {
    0 => usize::MAX,
    size if size < 64 => 64 / size,
    _ => 1,
  };

  /// Empty array; nothing is allocated until the first push.
  pub const fn new_in(allocator: A) -> Self {
    Self {
      block: MemBlock::EMPTY,
      len: 0,
      allocator,
      _marker: PhantomData,
    }
  }

  pub fn with_capacity_in(
    capacity: usize,
    allocator: A,
  ) -> Result<Self, AllocError> {
    let mut array = Self::new_in(allocator);
    array.reserve(capacity)?;
    Ok(array)
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn capacity(&self) -> usize {
    match mem::size_of::<T>() {
      0 => usize::MAX,
      size => self.block.len / size,
    }
  }

  pub fn allocator(&self) -> &A {
    &self.allocator
  }

  /// The block currently backing the array.
  pub fn block(&self) -> MemBlock {
    self.block
  }

  pub fn as_ptr(&self) -> *const T {
    self.data()
  }

  pub fn as_slice(&self) -> &[T] {
    // SAFETY: the first `len` slots are initialized.
    unsafe { slice::from_raw_parts(self.data(), self.len) }
  }

  pub fn as_mut_slice(&mut self) -> &mut [T] {
    // SAFETY: the first `len` slots are initialized.
    unsafe { slice::from_raw_parts_mut(self.data(), self.len) }
  }

  fn data(&self) -> *mut T {
    if self.block.is_null() {
      NonNull::dangling().as_ptr()
    } else {
      self.block.ptr as *mut T
    }
  }

  /// Grows the backing block so it holds at least `capacity` elements.
  fn grow_to(
    &mut self,
    capacity: usize,
  ) -> Result<(), AllocError> {
    if mem::size_of::<T>() == 0 || capacity <= self.capacity() {
      return Ok(());
    }

    let layout = Layout::array::<T>(capacity).map_err(|_| AllocError::CapacityOverflow)?;
    // SAFETY: `self.block` is empty or was produced by `self.allocator`.
    let block = unsafe { self.allocator.reallocate(self.block, layout) }?;

    trace!(
      "array grew from {} to {} bytes ({} elements)",
      self.block.len,
      block.len,
      capacity
    );

    self.block = block;
    Ok(())
  }

  /// Makes room for `additional` more elements.
  pub fn reserve(
    &mut self,
    additional: usize,
  ) -> Result<(), AllocError> {
    let needed = self
      .len
      .checked_add(additional)
      .ok_or(AllocError::CapacityOverflow)?;
    self.grow_to(needed)
  }

  /// Appends `value`, doubling the capacity when full.
  ///
  /// On failure the array is unchanged and `value` is dropped.
  pub fn push(
    &mut self,
    value: T,
  ) -> Result<(), AllocError> {
    if self.len == self.capacity() {
      let doubled = self.capacity().saturating_mul(2);
      self.grow_to(cmp::max(doubled, Self::MIN_CAPACITY))?;
    }

    // SAFETY: `len < capacity` after growing.
    unsafe { self.data().add(self.len).write(value) };
    self.len += 1;

    Ok(())
  }

  /// Moves the last element out.
  pub fn pop(&mut self) -> Option<T> {
    if self.len == 0 {
      return None;
    }

    self.len -= 1;
    // SAFETY: slot `len` was initialized and is now outside the live range.
    Some(unsafe { self.data().add(self.len).read() })
  }

  /// Drops the last element in place. Returns `false` if the array was
  /// empty.
  pub fn discard_last(&mut self) -> bool {
    if self.len == 0 {
      return false;
    }

    self.truncate(self.len - 1);
    true
  }

  /// Drops every element from `len` onwards.
  pub fn truncate(
    &mut self,
    len: usize,
  ) {
    if len >= self.len {
      return;
    }

    let tail = self.len - len;
    self.len = len;

    if mem::needs_drop::<T>() {
      // SAFETY: the tail was initialized and is no longer reachable.
      unsafe {
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.data().add(len), tail));
      }
    }
  }

  /// Drops the last `amount` elements (or all of them, if fewer).
  pub fn shrink_back(
    &mut self,
    amount: usize,
  ) {
    debug_assert!(amount <= self.len);
    self.truncate(self.len.saturating_sub(amount));
  }

  pub fn clear(&mut self) {
    self.truncate(0);
  }

  /// Resizes to `len`, filling new slots with values from `fill`.
  pub fn resize_with<F>(
    &mut self,
    len: usize,
    mut fill: F,
  ) -> Result<(), AllocError>
  where
    F: FnMut() -> T,
  {
    if len <= self.len {
      self.truncate(len);
      return Ok(());
    }

    self.grow_to(len)?;

    while self.len < len {
      // SAFETY: capacity covers `len` elements.
      unsafe { self.data().add(self.len).write(fill()) };
      self.len += 1;
    }

    Ok(())
  }

  /// Appends every element of `items`.
  pub fn extend_from_slice(
    &mut self,
    items: &[T],
  ) -> Result<(), AllocError>
  where
    T: Clone,
  {
    self.reserve(items.len())?;

    for item in items {
      // SAFETY: reserved above.
      unsafe { self.data().add(self.len).write(item.clone()) };
      self.len += 1;
    }

    Ok(())
  }

  pub fn resize(
    &mut self,
    len: usize,
    value: T,
  ) -> Result<(), AllocError>
  where
    T: Clone,
  {
    self.resize_with(len, || value.clone())
  }

  /// Appends `amount` default-constructed elements.
  pub fn expand_back(
    &mut self,
    amount: usize,
  ) -> Result<(), AllocError>
  where
    T: Default,
  {
    let len = self
      .len
      .checked_add(amount)
      .ok_or(AllocError::CapacityOverflow)?;
    self.resize_with(len, T::default)
  }
}

impl<T, A: Allocator> Drop for DynArray<T, A> {
  fn drop(&mut self) {
    self.clear();

    if !self.block.is_null() {
      // SAFETY: the block came from this allocator and is no longer used.
      unsafe { self.allocator.free(self.block) };
    }
  }
}

impl<T, A: Allocator> Deref for DynArray<T, A> {
  type Target = [T];

  fn deref(&self) -> &[T] {
    self.as_slice()
  }
}

impl<T, A: Allocator> DerefMut for DynArray<T, A> {
  fn deref_mut(&mut self) -> &mut [T] {
    self.as_mut_slice()
  }
}

impl<T: fmt::Debug, A: Allocator> fmt::Debug for DynArray<T, A> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_list().entries(self.iter()).finish()
  }
}

impl<T: PartialEq, A: Allocator, B: Allocator> PartialEq<DynArray<T, B>> for DynArray<T, A> {
  fn eq(
    &self,
    other: &DynArray<T, B>,
  ) -> bool {
    self.as_slice() == other.as_slice()
  }
}

impl<'a, T, A: Allocator> IntoIterator for &'a DynArray<T, A> {
  type Item = &'a T;
  type IntoIter = slice::Iter<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}
