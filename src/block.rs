//! # Boundary Tags
//!
//! The on-heap block format and the address arithmetic over it. Every block,
//! allocated or free, is framed by an 8-byte header and a bit-identical
//! 8-byte footer:
//!
//! ```text
//!                       One heap block (size = N bytes)
//!
//!   ┌────────────┬──────────────────────────────────────┬────────────┐
//!   │   header   │               payload                │   footer   │
//!   │ N | alloc  │   (or free-list links when free)     │ N | alloc  │
//!   └────────────┴──────────────────────────────────────┴────────────┘
//!   ▲            ▲
//!   │            │
//!   bp - 8       bp  (the block pointer handed to callers)
//! ```
//!
//! Sizes are always multiples of the 8-byte word, so the low three bits of
//! a tag are zero and bit 0 carries the allocated flag. The footer lets a
//! block's *physical* predecessor be found in O(1): the word at `bp - 16`
//! is the previous block's footer, and its size field is the distance back
//! to the previous block pointer.
//!
//! Free blocks additionally thread a doubly-linked list through the first
//! two payload words:
//!
//! ```text
//!   ┌────────────┬────────────┬────────────┬─────────┬────────────┐
//!   │   header   │ next-free  │ prev-free  │   ...   │   footer   │
//!   └────────────┴────────────┴────────────┴─────────┴────────────┘
//!                ▲
//!                bp
//! ```
//!
//! This is why the minimum block size is 32 bytes: header, two link words,
//! and footer must always fit.
//!
//! Everything in this module is a pure address computation; nothing here
//! allocates or walks more than one step.

use std::mem;

use static_assertions::const_assert;

/// Word size in bytes. Headers, footers, and free-list links are one word.
pub(crate) const WSIZE: usize = 8;

/// Double word size in bytes.
pub(crate) const DSIZE: usize = 2 * WSIZE;

/// Per-block bookkeeping overhead: one header plus one footer.
pub(crate) const OVERHEAD: usize = 2 * WSIZE;

/// Smallest legal block: header + next-free + prev-free + footer.
pub(crate) const MIN_BLOCK_SIZE: usize = 32;

/// Default heap extension granularity in bytes.
pub(crate) const CHUNKSIZE: usize = 1 << 12;

const_assert!(WSIZE == mem::size_of::<u64>());
const_assert!(WSIZE == mem::size_of::<*mut u8>());
const_assert!(MIN_BLOCK_SIZE == OVERHEAD + 2 * WSIZE);
const_assert!(CHUNKSIZE % DSIZE == 0);

/// Packs a block size and an allocated flag into one tag word.
///
/// `size` must be a multiple of [`WSIZE`]; the flag lives in bit 0.
pub(crate) fn pack(
  size: usize,
  alloc: bool,
) -> u64 {
  debug_assert!(size & (WSIZE - 1) == 0, "block sizes must be word multiples");
  size as u64 | alloc as u64
}

/// Extracts the size field from a tag word.
pub(crate) fn tag_size(word: u64) -> usize {
  (word & !0x7) as usize
}

/// Extracts the allocated flag from a tag word.
pub(crate) fn tag_alloc(word: u64) -> bool {
  word & 0x1 != 0
}

/// Reads the 8-byte word at `p`.
///
/// # Safety
///
/// `p` must be word-aligned and point into the heap region owned by the
/// allocator.
pub(crate) unsafe fn get(p: *mut u8) -> u64 {
  unsafe { (p as *mut u64).read() }
}

/// Writes the 8-byte word at `p`.
///
/// # Safety
///
/// Same contract as [`get`].
pub(crate) unsafe fn put(
  p: *mut u8,
  word: u64,
) {
  unsafe { (p as *mut u64).write(word) }
}

/// Address of the header of the block `bp` points into.
///
/// # Safety
///
/// `bp` must be a valid block pointer (one word past a header).
pub(crate) unsafe fn header(bp: *mut u8) -> *mut u8 {
  unsafe { bp.sub(WSIZE) }
}

/// Address of the footer of the block `bp` points into.
///
/// Derived from the header's size field, so the header must already hold
/// the block's final size when this is called.
///
/// # Safety
///
/// `bp` must be a valid block pointer with an initialized header.
pub(crate) unsafe fn footer(bp: *mut u8) -> *mut u8 {
  unsafe { bp.add(block_size(bp) - DSIZE) }
}

/// Total size in bytes of the block `bp` points into, read from its header.
///
/// # Safety
///
/// `bp` must be a valid block pointer with an initialized header.
pub(crate) unsafe fn block_size(bp: *mut u8) -> usize {
  unsafe { tag_size(get(header(bp))) }
}

/// Allocated flag of the block `bp` points into, read from its header.
///
/// # Safety
///
/// `bp` must be a valid block pointer with an initialized header.
pub(crate) unsafe fn block_alloc(bp: *mut u8) -> bool {
  unsafe { tag_alloc(get(header(bp))) }
}

/// Block pointer of the physically next block.
///
/// # Safety
///
/// `bp` must be a valid block pointer that is not the epilogue.
pub(crate) unsafe fn next_block(bp: *mut u8) -> *mut u8 {
  unsafe { bp.add(block_size(bp)) }
}

/// Block pointer of the physically previous block, found through the
/// previous block's footer at `bp - 16`.
///
/// # Safety
///
/// `bp` must be a valid block pointer that is not the prologue.
pub(crate) unsafe fn prev_block(bp: *mut u8) -> *mut u8 {
  unsafe { bp.sub(tag_size(get(bp.sub(DSIZE)))) }
}

/// Reads the next-free link of a free block (first payload word).
///
/// # Safety
///
/// `bp` must point at a free block whose link words are initialized.
pub(crate) unsafe fn next_free(bp: *mut u8) -> *mut u8 {
  unsafe { (bp as *mut *mut u8).read() }
}

/// Reads the prev-free link of a free block (second payload word).
///
/// # Safety
///
/// Same contract as [`next_free`].
pub(crate) unsafe fn prev_free(bp: *mut u8) -> *mut u8 {
  unsafe { (bp.add(WSIZE) as *mut *mut u8).read() }
}

/// Writes the next-free link of a free block.
///
/// # Safety
///
/// `bp` must point at a free block of at least [`MIN_BLOCK_SIZE`] bytes.
pub(crate) unsafe fn set_next_free(
  bp: *mut u8,
  ptr: *mut u8,
) {
  unsafe { (bp as *mut *mut u8).write(ptr) }
}

/// Writes the prev-free link of a free block.
///
/// # Safety
///
/// Same contract as [`set_next_free`].
pub(crate) unsafe fn set_prev_free(
  bp: *mut u8,
  ptr: *mut u8,
) {
  unsafe { (bp.add(WSIZE) as *mut *mut u8).write(ptr) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::ptr;

  #[test]
  fn pack_keeps_size_and_flag_separate() {
    assert_eq!(32, tag_size(pack(32, true)));
    assert_eq!(32, tag_size(pack(32, false)));
    assert!(tag_alloc(pack(32, true)));
    assert!(!tag_alloc(pack(32, false)));

    // The epilogue tag: zero size, allocated.
    assert_eq!(0, tag_size(pack(0, true)));
    assert!(tag_alloc(pack(0, true)));
  }

  #[test]
  fn header_and_footer_frame_the_block() {
    // A fabricated 48-byte block inside a word-aligned buffer.
    let mut buf = [0u64; 8];
    let base = buf.as_mut_ptr() as *mut u8;

    unsafe {
      let bp = base.add(WSIZE);
      put(header(bp), pack(48, true));
      put(footer(bp), pack(48, true));

      assert_eq!(header(bp), base);
      assert_eq!(footer(bp), base.add(48 - WSIZE));
      assert_eq!(48, block_size(bp));
      assert!(block_alloc(bp));
      assert_eq!(get(header(bp)), get(footer(bp)));
    }
  }

  #[test]
  fn physical_stepping_crosses_boundary_tags() {
    // Two adjacent 32-byte blocks; stepping forward from the first must land
    // on the second, and stepping backward must return.
    let mut buf = [0u64; 9];
    let base = buf.as_mut_ptr() as *mut u8;

    unsafe {
      let first = base.add(WSIZE);
      put(header(first), pack(32, true));
      put(footer(first), pack(32, true));

      let second = next_block(first);
      assert_eq!(second, first.add(32));
      put(header(second), pack(32, false));
      put(footer(second), pack(32, false));

      assert_eq!(first, prev_block(second));
      assert!(!block_alloc(second));
    }
  }

  #[test]
  fn free_links_occupy_the_first_two_payload_words() {
    let mut buf = [0u64; 4];
    let base = buf.as_mut_ptr() as *mut u8;

    unsafe {
      let bp = base.add(WSIZE);
      let target = base.add(3 * WSIZE);
      set_next_free(bp, target);
      set_prev_free(bp, ptr::null_mut());

      assert_eq!(target, next_free(bp));
      assert!(prev_free(bp).is_null());

      // The links are plain words at fixed payload offsets.
      assert_eq!(target as u64, buf[1]);
      assert_eq!(0, buf[2]);
    }
  }
}
