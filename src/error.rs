use thiserror::Error;

/// Why an allocation or reallocation was refused.
///
/// A failed call never touches the block it was given; the caller still
/// owns it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The arena has no room. `required` is what the aligned request would
  /// have consumed.
  #[error("arena exhausted: {requested} bytes requested, {required} bytes required")]
  Exhausted { requested: usize, required: usize },

  #[error("only the most recent arena allocation can be resized in place")]
  NotTopmost,

  #[error("system heap returned null for {size} bytes (align {align})")]
  OutOfMemory { size: usize, align: usize },

  #[error("alignment {requested} exceeds the supported alignment {supported}")]
  UnsupportedAlignment { requested: usize, supported: usize },

  #[error("null allocator never allocates")]
  Null,

  #[error("requested size overflows the address space")]
  CapacityOverflow,
}

/// Rejected allocator construction parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("alignment {0} is not a power of two")]
  AlignmentNotPowerOfTwo(usize),

  #[error("capacity {capacity} is not a multiple of the alignment {alignment}")]
  CapacityNotMultiple { capacity: usize, alignment: usize },

  #[error("buffer of {capacity} bytes is smaller than the minimum of {minimum}")]
  BufferTooSmall { capacity: usize, minimum: usize },

  #[error("backing alignment {alignment} is below the required {minimum}")]
  AlignmentTooSmall { alignment: usize, minimum: usize },

  #[error("failed to reserve a {capacity} byte buffer aligned to {alignment}")]
  BufferAllocation { capacity: usize, alignment: usize },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exhausted_reports_both_sizes() {
    let err = AllocError::Exhausted {
      requested: 10,
      required: 16,
    };

    assert_eq!(
      err.to_string(),
      "arena exhausted: 10 bytes requested, 16 bytes required"
    );
  }

  #[test]
  fn config_error_messages() {
    assert_eq!(
      ConfigError::AlignmentNotPowerOfTwo(12).to_string(),
      "alignment 12 is not a power of two"
    );
    assert_eq!(
      ConfigError::CapacityNotMultiple {
        capacity: 30,
        alignment: 8
      }
      .to_string(),
      "capacity 30 is not a multiple of the alignment 8"
    );
  }
}
