//! # Heap Sources
//!
//! The allocator's only platform dependency is an `sbrk`-like primitive: a
//! monotonic way to extend a contiguous address range by some byte count and
//! learn the previous end of that range. This module isolates that
//! dependency behind the [`HeapSource`] trait so the block machinery can run
//! against the real program break or against a plain in-process buffer.
//!
//! ```text
//!   Successive grow() calls hand out adjacent spans of one region:
//!
//!   ┌───────────────┬───────────────┬───────────────┐
//!   │   grow(32)    │  grow(4096)   │  grow(4096)   │ ...
//!   └───────────────┴───────────────┴───────────────┘
//!   ▲               ▲               ▲
//!   │               │               │
//!   region start    returned by     returned by
//!                   2nd call        3rd call
//! ```
//!
//! Two implementations are provided:
//!
//! - [`SbrkSource`] moves the process program break via `sbrk(2)`. This is
//!   the production source on Unix systems.
//! - [`ArenaSource`] hands out spans of a fixed, word-aligned buffer. It is
//!   deterministic and oblivious to whatever the system allocator does with
//!   the real break, which makes it the source of choice for tests.
//!
//! Contraction is deliberately absent: the allocator never returns memory
//! to its source.

use std::mem;

use libc::{c_void, intptr_t, sbrk};

use crate::align;
use crate::block::WSIZE;

/// A monotonic, contiguous memory region that can only grow.
///
/// The contract mirrors `sbrk`: growing by `incr` bytes returns the address
/// of the *previous* end of the region, which is the start of the newly
/// usable span. Consecutive calls must return adjacent spans.
pub trait HeapSource {
  /// Extends the region by `incr` bytes.
  ///
  /// Returns the previous end of the region, or `None` if the region cannot
  /// grow any further. `incr` is expected to be a multiple of the 8-byte
  /// word so the region end stays word-aligned.
  ///
  /// # Safety
  ///
  /// The caller must be the sole owner of the region; growing a region that
  /// something else is also extending interleaves the spans and breaks the
  /// adjacency contract.
  unsafe fn grow(
    &mut self,
    incr: usize,
  ) -> Option<*mut u8>;
}

/// The program break, grown via `sbrk(2)`.
///
/// `sbrk` reports failure with the sentinel address `(void *)-1`; that is
/// mapped to `None` here so callers never see the sentinel. Unix only.
pub struct SbrkSource;

impl HeapSource for SbrkSource {
  unsafe fn grow(
    &mut self,
    incr: usize,
  ) -> Option<*mut u8> {
    let old_brk = unsafe { sbrk(incr as intptr_t) };

    if old_brk == usize::MAX as *mut c_void {
      None
    } else {
      Some(old_brk as *mut u8)
    }
  }
}

/// A fixed-capacity heap region inside an ordinary allocation.
///
/// The buffer is a boxed slice of `u64` so its base is word-aligned, and the
/// internal break is only ever advanced by word multiples, keeping every
/// span this source hands out 8-byte aligned. Once the capacity is
/// exhausted, [`HeapSource::grow`] reports `None` exactly like a failing
/// `sbrk`.
pub struct ArenaSource {
  words: Box<[u64]>,

  /// Base of the buffer, captured at construction; every span handed out
  /// is derived from this one pointer.
  base: *mut u8,

  /// Bytes handed out so far; the arena's private program break.
  brk: usize,
}

impl ArenaSource {
  /// Creates an arena able to grow by `bytes` in total, rounded up to a
  /// whole number of words.
  pub fn with_capacity(bytes: usize) -> Self {
    let mut words = vec![0u64; align!(bytes) / WSIZE].into_boxed_slice();
    let base = words.as_mut_ptr() as *mut u8;
    Self { words, base, brk: 0 }
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.brk
  }

  /// Total bytes this arena can hand out.
  pub fn capacity(&self) -> usize {
    self.words.len() * WSIZE
  }
}

impl HeapSource for ArenaSource {
  unsafe fn grow(
    &mut self,
    incr: usize,
  ) -> Option<*mut u8> {
    debug_assert!(incr % WSIZE == 0, "arena growth must keep word alignment");

    let new_brk = self.brk.checked_add(incr)?;
    if new_brk > self.capacity() {
      return None;
    }

    let old_end = unsafe { self.base.add(self.brk) };
    self.brk = new_brk;

    Some(old_end)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn arena_spans_are_adjacent_and_aligned() {
    let mut arena = ArenaSource::with_capacity(256);

    unsafe {
      let first = arena.grow(32).expect("first span");
      let second = arena.grow(64).expect("second span");

      assert_eq!(first.add(32), second);
      assert_eq!(0, first as usize % WSIZE);
      assert_eq!(0, second as usize % WSIZE);
      assert_eq!(96, arena.used());
    }
  }

  #[test]
  fn arena_refuses_growth_past_capacity() {
    let mut arena = ArenaSource::with_capacity(64);

    unsafe {
      assert!(arena.grow(64).is_some());
      assert!(arena.grow(8).is_none());

      // A failed grow must not move the break.
      assert_eq!(64, arena.used());
    }
  }

  #[test]
  fn arena_capacity_rounds_up_to_words() {
    let arena = ArenaSource::with_capacity(60);
    assert_eq!(64, arena.capacity());
  }

  #[test]
  fn sbrk_source_grows_monotonically() {
    let mut source = SbrkSource;

    unsafe {
      let first = source.grow(64).expect("sbrk grow");
      let second = source.grow(64).expect("sbrk grow");

      assert!(!first.is_null());
      assert!(second >= first);
    }
  }
}
