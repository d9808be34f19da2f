use std::alloc::Layout;

use blockalloc::{
  Allocator, BumpAllocator, DynArray, FallbackAllocator, FreeListAllocator, MassFree, MemBlock,
  StackAllocator, SystemAllocator,
};

fn print_block(
  label: &str,
  base: *mut u8,
  block: MemBlock,
) {
  println!(
    "[{}] block at offset {:>4}, {:>4} usable bytes ({:?})",
    label,
    block.addr().wrapping_sub(base as usize) as isize,
    block.len,
    block.ptr,
  );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  env_logger::init();

  // --------------------------------------------------------------------
  // 1) A bump arena: every allocation moves the cursor forward.
  // --------------------------------------------------------------------
  let mut arena = BumpAllocator::new(64, 8)?;
  let base = arena.start();

  let first = arena.allocate(Layout::array::<u8>(10)?)?;
  let second = arena.allocate(Layout::array::<u8>(10)?)?;
  println!("\n[1] Bump arena, capacity {}", arena.capacity());
  print_block("1", base, first);
  print_block("1", base, second);

  // Only the topmost block can be given back.
  unsafe { arena.free(first) };
  println!("[1] after freeing the first block, used = {}", arena.used());
  unsafe { arena.free(second) };
  println!("[1] after freeing the second block, used = {}", arena.used());

  // --------------------------------------------------------------------
  // 2) A stack arena spills into its front once the back is full.
  // --------------------------------------------------------------------
  let mut stack = StackAllocator::new(40, 16)?;
  let base = stack.start();

  let back = stack.allocate(Layout::array::<u8>(20)?)?;
  let front = stack.allocate(Layout::array::<u8>(4)?)?;
  println!("\n[2] Stack arena, back = {}, front = {}", stack.back(), stack.front());
  print_block("2", base, back);
  print_block("2", base, front);

  // --------------------------------------------------------------------
  // 3) A free list on top of an arena recycles freed blocks.
  // --------------------------------------------------------------------
  let mut recycler = FreeListAllocator::new(BumpAllocator::new(256, 8)?)?;
  let base = recycler.backing().start();

  let block = recycler.allocate(Layout::array::<u8>(100)?)?;
  print_block("3", base, block);
  unsafe { recycler.free(block) };

  let small = recycler.allocate(Layout::array::<u8>(40)?)?;
  println!(
    "\n[3] split: {} free node(s) holding {} bytes",
    recycler.free_nodes(),
    recycler.free_bytes()
  );
  print_block("3", base, small);

  recycler.free_all();

  // --------------------------------------------------------------------
  // 4) A growable array that starts in an arena and moves to the heap.
  // --------------------------------------------------------------------
  let mut allocator = FallbackAllocator::new(BumpAllocator::new(128, 8)?, SystemAllocator::new());

  {
    let mut numbers = DynArray::new_in(&mut allocator);
    for i in 0..8u64 {
      numbers.push(i)?;
    }
    println!(
      "\n[4] {} elements, capacity {}, in arena: {}",
      numbers.len(),
      numbers.capacity(),
      numbers.allocator().main().contains(numbers.block())
    );

    for i in 8..100u64 {
      numbers.push(i)?;
    }
    println!(
      "[4] {} elements, capacity {}, in arena: {}",
      numbers.len(),
      numbers.capacity(),
      numbers.allocator().main().contains(numbers.block())
    );
  }

  println!("\n[5] End of walkthrough. Arena used = {}", allocator.main().used());

  Ok(())
}
