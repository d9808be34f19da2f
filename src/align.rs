use std::mem;

/// Largest alignment the platform heap guarantees for any request
/// (`alignof(max_align_t)` on the targets we care about).
pub const MAX_ALIGN: usize = 2 * mem::size_of::<usize>();

/// Calculates the machine word alignment for the given size.
///
/// # Examples
///
/// ```rust
/// use blockalloc::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + ::core::mem::size_of::<usize>() - 1) & !(::core::mem::size_of::<usize>() - 1)
  };
}

/// Rounds `value` up to the next multiple of a power-of-two `alignment`.
///
/// ```rust
/// use blockalloc::align_to;
///
/// assert_eq!(align_to!(10, 8), 16);
/// assert_eq!(align_to!(32, 16), 32);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + $alignment - 1) & !($alignment - 1)
  };
}

#[inline]
pub const fn is_power_of_two(value: usize) -> bool {
  value != 0 && value & (value - 1) == 0
}

/// Rounds an address (or offset) up to a multiple of `alignment`.
///
/// `alignment` must be a power of two. That is a caller contract, only
/// checked in debug builds.
#[inline]
pub const fn align_up(
  value: usize,
  alignment: usize,
) -> usize {
  debug_assert!(is_power_of_two(alignment));
  align_to!(value, alignment)
}

/// Same as [`align_up`] but returns `None` instead of wrapping around.
#[inline]
pub const fn checked_align_up(
  value: usize,
  alignment: usize,
) -> Option<usize> {
  debug_assert!(is_power_of_two(alignment));
  match value.checked_add(alignment - 1) {
    Some(bumped) => Some(bumped & !(alignment - 1)),
    None => None,
  }
}

#[inline]
pub const fn align_down(
  value: usize,
  alignment: usize,
) -> usize {
  debug_assert!(is_power_of_two(alignment));
  value & !(alignment - 1)
}

/// Rounds a pointer up to the next multiple of `alignment`, keeping its
/// provenance.
#[inline]
pub fn align_ptr(
  ptr: *mut u8,
  alignment: usize,
) -> *mut u8 {
  let addr = ptr as usize;
  ptr.wrapping_add(align_up(addr, alignment) - addr)
}
