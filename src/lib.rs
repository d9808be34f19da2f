//! # blockalloc - Composable Memory Allocators
//!
//! This crate provides a family of small, interchangeable allocators that all
//! speak one contract ([`Allocator`]) and can be stacked on top of each other,
//! plus a growable array ([`DynArray`]) that runs on any of them.
//!
//! ## Overview
//!
//! Every allocator hands out [`MemBlock`]s: an address plus the *usable*
//! length, which may be larger than what was asked for.
//!
//! ```text
//!   Composition:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                       FallbackAllocator                              │
//!   │                                                                      │
//!   │   ┌──────────────────────────────┐   ┌───────────────────────────┐   │
//!   │   │  main (ownership-aware)      │   │  spare                    │   │
//!   │   │                              │   │                           │   │
//!   │   │   FreeListAllocator          │   │   SystemAllocator         │   │
//!   │   │        │                     │   │   (malloc / free)         │   │
//!   │   │        ▼                     │   │                           │   │
//!   │   │   BumpAllocator (arena)      │   │                           │   │
//!   │   └──────────────────────────────┘   └───────────────────────────┘   │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Requests go to `main` first; when it refuses they are retried on `spare`.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   blockalloc
//!   ├── align      - Alignment macros (align!, align_to!) and helpers
//!   ├── block      - MemBlock, the address + length currency
//!   ├── error      - AllocError / ConfigError
//!   ├── traits     - Allocator contract and capability traits
//!   ├── null       - NullAllocator
//!   ├── system     - SystemAllocator, AlignedSystemAllocator
//!   ├── bump       - BumpAllocator
//!   ├── stack      - StackAllocator (double-ended arena)
//!   ├── free_list  - FreeListAllocator
//!   ├── fallback   - FallbackAllocator
//!   └── array      - DynArray
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::alloc::Layout;
//! use blockalloc::{Allocator, BumpAllocator, DynArray, FallbackAllocator, SystemAllocator};
//!
//! let arena = BumpAllocator::new(256, 16).unwrap();
//! let mut allocator = FallbackAllocator::new(arena, SystemAllocator::new());
//!
//! let block = allocator.allocate(Layout::new::<u64>()).unwrap();
//! assert!(allocator.main().contains(block));
//!
//! let mut numbers = DynArray::new_in(&mut allocator);
//! for i in 0..1000u32 {
//!     numbers.push(i).unwrap();
//! }
//! assert_eq!(numbers[999], 999);
//! ```
//!
//! ## Capabilities
//!
//! Each allocator describes itself once, at construction:
//!
//! ```text
//!   allocator            alignment     ownership-aware   mass free
//!   ───────────────────  ────────────  ────────────────  ─────────
//!   NullAllocator        runtime       yes               yes
//!   SystemAllocator      fixed (16)    no                no
//!   AlignedSystemAlloc.  runtime       no                no
//!   BumpAllocator        fixed         yes               yes
//!   StackAllocator       fixed         yes               yes
//!   FreeListAllocator    = backing     = backing         = backing
//!   FallbackAllocator    combined      = spare           both
//! ```
//!
//! Ownership awareness and mass free are also traits ([`OwnershipAware`],
//! [`MassFree`]), so a fallback over a non-aware primary, or a mass free
//! over a heap-backed free list, does not compile.
//!
//! ## Failure
//!
//! Nothing in this crate panics on allocation failure. Allocation and
//! reallocation return `Err(AllocError)`, and a failed reallocation never
//! touches the block it was given.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives; none of the
//!   allocators are `Send` or `Sync`
//! - **Arenas reclaim LIFO only**: bump and stack allocators only take back
//!   their most recent block; the rest waits for a mass free
//! - **No coalescing**: the free list never merges neighbouring blocks
//!
//! ## Safety
//!
//! Freeing or reallocating a block hands raw memory back to an allocator, so
//! those operations are `unsafe`: the block must come from the same
//! allocator and must not be used afterwards.

pub mod align;
mod arena;
mod array;
mod block;
mod bump;
mod error;
mod fallback;
mod free_list;
mod null;
mod stack;
mod system;
mod traits;

pub use array::DynArray;
pub use block::MemBlock;
pub use bump::BumpAllocator;
pub use error::{AllocError, ConfigError};
pub use fallback::FallbackAllocator;
pub use free_list::FreeListAllocator;
pub use null::NullAllocator;
pub use stack::StackAllocator;
pub use system::{AlignedHeapFns, AlignedSystemAllocator, HeapFns, SystemAllocator};
pub use traits::{Alignment, Allocator, Capabilities, MassFree, OwnershipAware, allocate_slice};
