use std::{alloc::Layout, mem, ptr};

use log::trace;

use crate::{
  align::align_up,
  block::MemBlock,
  error::{AllocError, ConfigError},
  traits::{Alignment, Allocator, Capabilities, MassFree, OwnershipAware},
};

/// Header written into the first bytes of every freed block.
#[repr(C)]
struct Node {
  next: *mut Node,
  size: usize,
}

const NODE_SIZE: usize = mem::size_of::<Node>();
const NODE_ALIGN: usize = mem::align_of::<Node>();

/// Recycles freed blocks before asking the backing allocator for more.
///
/// ```text
///   head
///    │
///    ▼
///   ┌────────────┬──────┐      ┌────────────┬──────────────┐
///   │ next, size │ ...  │ ───► │ next, size │     ...      │ ───► null
///   └────────────┴──────┘      └────────────┴──────────────┘
///     freed block #2             freed block #1
/// ```
///
/// Freed blocks are pushed on the front of the list; adjacent free blocks
/// are never merged. An allocation takes the first node that is large
/// enough, splitting it when the request needs at most half of it.
///
/// Blocks parked on the list when the allocator is dropped are not handed
/// back to the backing allocator individually, since split remainders are
/// not blocks the backing allocator produced. Pair it with an arena (or
/// call [`MassFree::free_all`]) to reclaim them.
#[derive(Debug)]
pub struct FreeListAllocator<A: Allocator> {
  backing: A,
  head: *mut Node,
}

impl<A: Allocator> FreeListAllocator<A> {
  /// Fails if the backing allocator's fixed alignment cannot hold a list
  /// node.
  pub fn new(backing: A) -> Result<Self, ConfigError> {
    if let Alignment::Fixed(alignment) = backing.capabilities().alignment {
      if alignment < NODE_ALIGN {
        return Err(ConfigError::AlignmentTooSmall {
          alignment,
          minimum: NODE_ALIGN,
        });
      }
    }

    Ok(Self {
      backing,
      head: ptr::null_mut(),
    })
  }

  pub fn backing(&self) -> &A {
    &self.backing
  }

  /// Number of blocks currently parked on the list.
  pub fn free_nodes(&self) -> usize {
    self.nodes().count()
  }

  /// Total bytes currently parked on the list.
  pub fn free_bytes(&self) -> usize {
    self.nodes().map(|(_, size)| size).sum()
  }

  fn nodes(&self) -> impl Iterator<Item = (*mut Node, usize)> + '_ {
    let mut node = self.head;
    std::iter::from_fn(move || {
      if node.is_null() {
        return None;
      }
      // SAFETY: every node on the list lives inside a block we own.
      let (current, size, next) = unsafe { (node, (*node).size, (*node).next) };
      node = next;
      Some((current, size))
    })
  }

  /// Granularity used when splitting a node.
  fn split_alignment(
    &self,
    layout: Layout,
  ) -> Result<usize, AllocError> {
    let align = self.backing.capabilities().alignment.resolve(layout)?;
    Ok(align.max(NODE_ALIGN))
  }

  fn take_from_list(
    &mut self,
    size: usize,
    layout: Layout,
    split_align: usize,
  ) -> Option<MemBlock> {
    let mut link: *mut *mut Node = &raw mut self.head;

    // SAFETY: `link` always points at `head` or at the `next` field of a
    // node that lives inside a block we own.
    unsafe {
      while !(*link).is_null() {
        let node = *link;
        let node_size = (*node).size;
        let next = (*node).next;

        if size <= node_size && (node as usize) % layout.align() == 0 {
          if size <= node_size / 2 {
            let cut = align_up(size, split_align);

            if cut + NODE_SIZE <= node_size {
              let rest = (node as *mut u8).add(cut) as *mut Node;
              rest.write(Node {
                next,
                size: node_size - cut,
              });
              *link = rest;

              return Some(MemBlock::new(node as *mut u8, cut));
            }
          }

          *link = next;
          return Some(MemBlock::new(node as *mut u8, node_size));
        }

        link = &raw mut (*node).next;
      }
    }

    None
  }
}

impl<A: Allocator> Allocator for FreeListAllocator<A> {
  fn capabilities(&self) -> Capabilities {
    self.backing.capabilities()
  }

  fn contains(
    &self,
    block: MemBlock,
  ) -> bool {
    self.nodes().any(|(node, _)| node as *mut u8 == block.ptr) || self.backing.contains(block)
  }

  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    let split_align = self.split_alignment(layout)?;
    let size = layout.size().max(NODE_SIZE);

    if let Some(block) = self.take_from_list(size, layout, split_align) {
      return Ok(block);
    }

    trace!("free list has no node for {} bytes, asking backing allocator", size);

    let layout = Layout::from_size_align(size, layout.align().max(NODE_ALIGN))
      .map_err(|_| AllocError::CapacityOverflow)?;
    self.backing.allocate(layout)
  }

  unsafe fn free(
    &mut self,
    block: MemBlock,
  ) {
    if block.is_null() {
      return;
    }

    debug_assert!(block.len >= NODE_SIZE, "block too small for a list node");
    debug_assert_eq!(block.addr() % NODE_ALIGN, 0, "misaligned free");

    let node = block.ptr as *mut Node;
    // SAFETY: the caller hands the block back to us; its first bytes are
    // ours to overwrite.
    unsafe {
      node.write(Node {
        next: self.head,
        size: block.len,
      })
    };
    self.head = node;
  }

  unsafe fn reallocate(
    &mut self,
    block: MemBlock,
    layout: Layout,
  ) -> Result<MemBlock, AllocError> {
    if block.is_null() {
      return self.allocate(layout);
    }

    let fresh = self.allocate(layout)?;
    unsafe {
      block.copy_prefix_to(fresh);
      self.free(block);
    }

    Ok(fresh)
  }
}

impl<A: OwnershipAware> OwnershipAware for FreeListAllocator<A> {}

impl<A: MassFree> MassFree for FreeListAllocator<A> {
  fn free_all(&mut self) {
    self.backing.free_all();
    self.head = ptr::null_mut();
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;
  use crate::{BumpAllocator, SystemAllocator};

  fn bytes(size: usize) -> Layout {
    Layout::array::<u8>(size).unwrap()
  }

  fn arena_list() -> FreeListAllocator<BumpAllocator> {
    FreeListAllocator::new(BumpAllocator::new(1024, 8).unwrap()).unwrap()
  }

  #[test]
  fn freed_block_is_recycled() {
    let mut allocator = arena_list();

    let block = allocator.allocate(bytes(100)).unwrap();
    unsafe { allocator.free(block) };

    assert_eq!(allocator.free_nodes(), 1);
    assert_eq!(allocator.allocate(bytes(100)).unwrap(), block);
    assert_eq!(allocator.free_nodes(), 0);
  }

  #[test]
  fn small_request_splits_node() {
    let mut allocator = arena_list();

    let block = allocator.allocate(bytes(100)).unwrap();
    assert_eq!(block.len, 104);
    unsafe { allocator.free(block) };

    let small = allocator.allocate(bytes(40)).unwrap();
    assert_eq!(small, MemBlock::new(block.ptr, 40));
    assert_eq!(allocator.free_nodes(), 1);
    assert_eq!(allocator.free_bytes(), 64);

    let rest = allocator.allocate(bytes(60)).unwrap();
    assert_eq!(rest, MemBlock::new(block.ptr.wrapping_add(40), 64));
    assert_eq!(allocator.free_nodes(), 0);
    assert_eq!(allocator.backing().used(), 104);
  }

  #[test]
  fn large_request_takes_whole_node() {
    let mut allocator = arena_list();

    let block = allocator.allocate(bytes(100)).unwrap();
    unsafe { allocator.free(block) };

    assert_eq!(allocator.allocate(bytes(60)).unwrap(), block);
  }

  #[test]
  fn miss_falls_through_to_backing() {
    let mut allocator = arena_list();

    let small = allocator.allocate(bytes(16)).unwrap();
    unsafe { allocator.free(small) };

    let big = allocator.allocate(bytes(64)).unwrap();
    assert_ne!(big.ptr, small.ptr);
    assert_eq!(allocator.free_nodes(), 1);
  }

  #[test]
  fn tiny_requests_fit_a_node() {
    let mut allocator = arena_list();

    let block = allocator.allocate(bytes(1)).unwrap();
    assert!(block.len >= NODE_SIZE);

    unsafe { allocator.free(block) };
    assert_eq!(allocator.allocate(bytes(1)).unwrap(), block);
  }

  #[test]
  fn contains_covers_free_and_live_blocks() {
    let mut allocator = arena_list();

    let live = allocator.allocate(bytes(32)).unwrap();
    let parked = allocator.allocate(bytes(32)).unwrap();
    unsafe { allocator.free(parked) };

    assert!(allocator.contains(live));
    assert!(allocator.contains(parked));

    let mut outside = [0u64; 2];
    assert!(!allocator.contains(MemBlock::new(outside.as_mut_ptr() as *mut u8, 16)));
  }

  #[test]
  fn realloc_moves_and_recycles_old_block() {
    let mut allocator = arena_list();

    let block = allocator.allocate(bytes(24)).unwrap();
    unsafe {
      for i in 0..24 {
        block.ptr.add(i).write(i as u8);
      }

      let grown = allocator.reallocate(block, bytes(80)).unwrap();
      assert_ne!(grown.ptr, block.ptr);
      for i in 0..24 {
        assert_eq!(grown.ptr.add(i).read(), i as u8);
      }
    }

    assert_eq!(allocator.free_nodes(), 1);
    assert_eq!(allocator.allocate(bytes(24)).unwrap(), block);
  }

  #[test]
  fn free_all_clears_list_and_backing() {
    let mut allocator = arena_list();

    let block = allocator.allocate(bytes(48)).unwrap();
    unsafe { allocator.free(block) };

    allocator.free_all();

    assert_eq!(allocator.free_nodes(), 0);
    assert_eq!(allocator.backing().used(), 0);
  }

  #[test]
  fn rejects_backing_alignment_below_node() {
    let backing = BumpAllocator::new(64, 1).unwrap();

    assert_eq!(
      FreeListAllocator::new(backing).unwrap_err(),
      ConfigError::AlignmentTooSmall {
        alignment: 1,
        minimum: NODE_ALIGN
      }
    );
  }

  #[test]
  fn recycles_system_heap_blocks() {
    let mut allocator = FreeListAllocator::new(SystemAllocator::new()).unwrap();

    let block = allocator.allocate(bytes(256)).unwrap();
    unsafe { allocator.free(block) };
    let again = allocator.allocate(bytes(256)).unwrap();

    assert_eq!(again, block);
    unsafe { allocator.backing.free(again) };
  }

  proptest! {
    #[test]
    fn free_then_allocate_returns_same_address(
      prefix in proptest::collection::vec(1usize..128, 0..10),
      size in 1usize..200,
    ) {
      let mut allocator = FreeListAllocator::new(BumpAllocator::new(8192, 8).unwrap()).unwrap();
      for p in prefix {
        let block = allocator.allocate(bytes(p)).unwrap();
        unsafe { allocator.free(block) };
      }

      let block = allocator.allocate(bytes(size)).unwrap();
      unsafe { allocator.free(block) };
      let again = allocator.allocate(bytes(size)).unwrap();

      prop_assert_eq!(again.ptr, block.ptr);
    }
  }
}
