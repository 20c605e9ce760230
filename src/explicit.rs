//! # Explicit Free List Allocator
//!
//! A block-structured heap allocator with boundary-tag coalescing and an
//! explicit doubly-linked free list with LIFO insertion.
//!
//! ## Heap Layout
//!
//! The heap is one contiguous region grown on demand from a [`HeapSource`].
//! It starts with one word of alignment padding and a 16-byte *prologue*
//! block (header and footer only), and ends with a zero-size *epilogue*
//! header. Both sentinels are marked allocated and are never freed, split,
//! or handed to callers; their only job is to terminate physical walks and
//! coalescing without bounds checks.
//!
//! ```text
//!              HEAP MEMORY (grows upward →)
//!
//!   ┌──────┬──────┬──────┬────────────┬────────────┬─────┬──────┐
//!   │ pad  │ pro- │ pro- │  block 1   │  block 2   │ ... │ epi- │
//!   │ 8 B  │ hdr  │ ftr  │            │            │     │ hdr  │
//!   │      │ 16|1 │ 16|1 │            │            │     │ 0|1  │
//!   └──────┴──────┴──────┴────────────┴────────────┴─────┴──────┘
//!          ▲                                               ▲
//!          │                                               │
//!          prologue block                     next extension overwrites
//!                                             this slot with a header
//! ```
//!
//! Every block carries an 8-byte header and an identical footer encoding
//! `size | alloc`; the `block` module holds that arithmetic. Free blocks
//! thread a doubly-linked list through their first two payload words:
//!
//! ```text
//!   free_head ──► ┌─────────┐     ┌─────────┐     ┌─────────┐
//!                 │ block C │────►│ block A │────►│ block B │──► null
//!        null ◄───│         │◄────│         │◄────│         │
//!                 └─────────┘     └─────────┘     └─────────┘
//!
//!   List order is LIFO: the block freed most recently is the head and is
//!   reused first. Physical address order is unrelated to list order.
//! ```
//!
//! ## Allocation
//!
//! A request is rounded up to a word multiple plus header/footer overhead
//! (minimum 32 bytes so the linkage words always fit), the free list is
//! scanned first-fit, and the winning block is split when the remainder
//! could stand as a block of its own. When nothing fits, the heap grows by
//! at least one 4096-byte chunk and the new space is merged with a trailing
//! free block before placement.
//!
//! ## Coalescing
//!
//! Freeing is eager: a newly freed block is merged immediately with any
//! free physical neighbour, so no two free blocks are ever adjacent. The
//! footer of the previous block and the header of the next block are both
//! one fixed offset away, which makes the four adjacency cases O(1):
//!
//! ```text
//!   prev | next | action
//!   ─────┼──────┼────────────────────────────────────────────
//!   used | used | insert the block as-is
//!   used | free | absorb the next block
//!   free | used | the previous block absorbs this one
//!   free | free | the previous block absorbs both
//! ```
//!
//! ## Safety
//!
//! The allocator owns every byte of its heap region and hands out borrowed
//! payload spans between `allocate` and `deallocate`. It never validates
//! caller pointers: deallocating a foreign pointer, deallocating twice, or
//! writing past a payload corrupts the heap silently, exactly as with
//! `malloc(3)`. It is strictly single-threaded; embedders needing
//! concurrency must serialize externally.

use std::{mem, process, ptr};

use log::{debug, error, trace};

use crate::align;
use crate::block::{
  CHUNKSIZE, DSIZE, MIN_BLOCK_SIZE, OVERHEAD, WSIZE, block_alloc, block_size, footer, get, header,
  next_block, next_free, pack, prev_block, prev_free, put, set_next_free, set_prev_free, tag_alloc,
  tag_size,
};
use crate::source::HeapSource;

/// A heap allocator with an explicit, LIFO, doubly-linked free list.
///
/// The allocator owns a [`HeapSource`] and carves the region it grows into
/// boundary-tagged blocks. All state lives in the instance, so independent
/// heaps are just independent values with their own sources.
///
/// # Thread Safety
///
/// This allocator is **NOT** thread-safe. For multi-threaded usage,
/// external synchronization (e.g. a `Mutex`) is required.
///
/// # Example
///
/// ```rust,ignore
/// use exallocator::{ExplicitAllocator, SbrkSource};
///
/// let mut heap = unsafe { ExplicitAllocator::init(SbrkSource).unwrap() };
///
/// unsafe {
///   let p = heap.allocate(64);
///   assert!(!p.is_null());
///
///   p.write_bytes(0xAB, 64);
///   heap.deallocate(p);
/// }
/// ```
pub struct ExplicitAllocator<S: HeapSource> {
  /// Where heap bytes come from. Grown, never shrunk.
  source: S,

  /// Block pointer of the prologue; the anchor for physical walks.
  prologue: *mut u8,

  /// Head of the free list; null when no block is free.
  free_head: *mut u8,
}

impl<S: HeapSource> ExplicitAllocator<S> {
  /// Creates the initial empty heap on `source`: alignment padding, the
  /// prologue and epilogue sentinels, and one free chunk of 4096 bytes.
  ///
  /// # Returns
  ///
  /// The ready-to-use allocator, or `None` when the source refuses the
  /// initial growth.
  ///
  /// # Safety
  ///
  /// `source` must be the sole owner of the region it grows, and the
  /// returned allocator must remain the only code writing to that region.
  pub unsafe fn init(source: S) -> Option<Self> {
    let mut heap = Self {
      source,
      prologue: ptr::null_mut(),
      free_head: ptr::null_mut(),
    };

    unsafe {
      let base = heap.source.grow(4 * WSIZE)?;

      put(base, 0); // alignment padding
      put(base.add(WSIZE), pack(DSIZE, true)); // prologue header
      put(base.add(2 * WSIZE), pack(DSIZE, true)); // prologue footer
      put(base.add(3 * WSIZE), pack(0, true)); // epilogue header

      heap.prologue = base.add(DSIZE);

      if heap.extend_heap(CHUNKSIZE / WSIZE).is_null() {
        return None;
      }
    }

    Some(heap)
  }

  /// Allocates a block with at least `size` bytes of payload.
  ///
  /// The returned pointer addresses the first payload byte and is 8-byte
  /// aligned. It stays valid until passed to [`deallocate`] or
  /// [`reallocate`].
  ///
  /// # Returns
  ///
  /// A payload pointer, or null when `size` is zero or the heap source is
  /// exhausted.
  ///
  /// # Safety
  ///
  /// The heap must not have been corrupted through an earlier invalid
  /// deallocation or out-of-bounds payload write.
  ///
  /// [`deallocate`]: ExplicitAllocator::deallocate
  /// [`reallocate`]: ExplicitAllocator::reallocate
  pub unsafe fn allocate(
    &mut self,
    size: u32,
  ) -> *mut u8 {
    if size == 0 {
      // A refusal, not an error.
      return ptr::null_mut();
    }

    let size = size as usize;

    // Adjust the request: payloads too small for the free-list links get
    // a minimum block, everything else is rounded up to a word multiple
    // with header and footer overhead included.
    let asize = if size <= DSIZE - WSIZE {
      MIN_BLOCK_SIZE
    } else {
      align!(size + OVERHEAD).max(MIN_BLOCK_SIZE)
    };

    unsafe {
      let bp = self.find_fit(asize);
      if !bp.is_null() {
        self.place(bp, asize);
        return bp;
      }

      // No fit; grow the heap by at least one chunk.
      debug!("no fit for {asize} bytes, extending heap");

      let extendsize = asize.max(CHUNKSIZE);
      let bp = self.extend_heap(extendsize / WSIZE);
      if bp.is_null() {
        return ptr::null_mut();
      }

      self.place(bp, asize);
      bp
    }
  }

  /// Frees the block at `bp`, merging it with free physical neighbours.
  ///
  /// Deallocating null is a no-op, matching `free(3)`.
  ///
  /// # Safety
  ///
  /// `bp` must be null or a pointer previously returned by [`allocate`] or
  /// [`reallocate`] on this allocator and not yet deallocated. Double
  /// frees and foreign pointers are undefined behaviour.
  ///
  /// [`allocate`]: ExplicitAllocator::allocate
  /// [`reallocate`]: ExplicitAllocator::reallocate
  pub unsafe fn deallocate(
    &mut self,
    bp: *mut u8,
  ) {
    if bp.is_null() {
      return;
    }

    unsafe {
      let size = block_size(bp);

      put(header(bp), pack(size, false));
      put(footer(bp), pack(size, false));
      set_next_free(bp, ptr::null_mut());
      set_prev_free(bp, ptr::null_mut());

      self.coalesce(bp);
    }
  }

  /// Moves the allocation at `ptr` into a fresh block of at least `size`
  /// payload bytes, copying the smaller of the old and new payload sizes.
  ///
  /// No in-place growth or shrink is attempted. A reallocation failure has
  /// no recoverable answer mid-copy, so it aborts the process.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live pointer previously returned by [`allocate`] or
  /// [`reallocate`] on this allocator.
  ///
  /// [`allocate`]: ExplicitAllocator::allocate
  /// [`reallocate`]: ExplicitAllocator::reallocate
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    size: u32,
  ) -> *mut u8 {
    unsafe {
      let newp = self.allocate(size);
      if newp.is_null() {
        error!("allocate failed in reallocate, aborting");
        process::abort();
      }

      // Payloads are assumed to stay below 4 GiB.
      let mut copy_size = (block_size(ptr) - OVERHEAD) as u32;
      if size < copy_size {
        copy_size = size;
      }

      ptr::copy_nonoverlapping(ptr, newp, copy_size as usize);
      self.deallocate(ptr);

      newp
    }
  }

  /// Checks the heap for consistency, logging every violation found.
  ///
  /// Walks the physical block chain from prologue to epilogue and verifies
  /// the sentinel tags, payload alignment, and header/footer equality of
  /// every block. With `verbose` set, each block is additionally dumped at
  /// debug level. State is never mutated.
  ///
  /// # Safety
  ///
  /// The walk trusts the size fields it reads; on a heap corrupted badly
  /// enough it may itself read out of bounds.
  pub unsafe fn checkheap(
    &self,
    verbose: bool,
  ) {
    unsafe {
      if verbose {
        debug!("heap, prologue at {:p}:", self.prologue);
      }

      if block_size(self.prologue) != DSIZE || !block_alloc(self.prologue) {
        error!("bad prologue header");
      }

      let mut bp = self.prologue;
      while block_size(bp) > 0 {
        if verbose {
          self.log_block(bp);
        }
        self.check_block(bp);
        bp = next_block(bp);
      }

      if verbose {
        self.log_block(bp);
      }

      if block_size(bp) != 0 || !block_alloc(bp) {
        error!("bad epilogue header");
      }
    }
  }

  /// Extends the heap with a free block of `words` words and merges it
  /// with a trailing free block if there is one.
  ///
  /// The word count is rounded up to even so the region end stays 8-byte
  /// aligned past the old epilogue, whose slot becomes the new block's
  /// header.
  ///
  /// # Returns
  ///
  /// The (possibly merged) free block, or null when the source refuses.
  unsafe fn extend_heap(
    &mut self,
    words: usize,
  ) -> *mut u8 {
    let size = if words % 2 == 1 {
      (words + 1) * WSIZE
    } else {
      words * WSIZE
    };
    let size = size.max(MIN_BLOCK_SIZE);

    unsafe {
      let bp = match self.source.grow(size) {
        Some(bp) => bp,
        None => return ptr::null_mut(),
      };

      trace!("extended heap by {size} bytes at {bp:p}");

      // The old epilogue slot becomes the header of the new free block,
      // and a fresh epilogue is written past its end.
      put(header(bp), pack(size, false));
      put(footer(bp), pack(size, false));
      put(header(next_block(bp)), pack(0, true));

      set_next_free(bp, ptr::null_mut());
      set_prev_free(bp, ptr::null_mut());

      self.coalesce(bp)
    }
  }

  /// First-fit search: returns the first free-list block with size at
  /// least `asize`, or null when nothing fits.
  unsafe fn find_fit(
    &self,
    asize: usize,
  ) -> *mut u8 {
    unsafe {
      let mut bp = self.free_head;

      while !bp.is_null() {
        if asize <= block_size(bp) {
          return bp;
        }
        bp = next_free(bp);
      }
    }

    ptr::null_mut()
  }

  /// Places an `asize`-byte allocation at the start of free block `bp`,
  /// splitting off the remainder when it can stand as a block of its own.
  ///
  /// Remainders below [`MIN_BLOCK_SIZE`] stay inside the allocated block
  /// as internal slack.
  unsafe fn place(
    &mut self,
    bp: *mut u8,
    asize: usize,
  ) {
    unsafe {
      let csize = block_size(bp);

      self.delete_free(bp);

      if csize - asize >= MIN_BLOCK_SIZE {
        put(header(bp), pack(asize, true));
        put(footer(bp), pack(asize, true));

        let remainder = next_block(bp);
        put(header(remainder), pack(csize - asize, false));
        put(footer(remainder), pack(csize - asize, false));
        set_next_free(remainder, ptr::null_mut());
        set_prev_free(remainder, ptr::null_mut());
        self.insert_free(remainder);
      } else {
        put(header(bp), pack(csize, true));
        put(footer(bp), pack(csize, true));
      }
    }
  }

  /// Boundary-tag coalescing of the just-freed block `bp` with its free
  /// physical neighbours. The merged block is inserted at the head of the
  /// free list.
  ///
  /// The prologue and epilogue are marked allocated, so merging stops at
  /// the heap edges without special cases.
  ///
  /// # Returns
  ///
  /// The block pointer of the merged block.
  unsafe fn coalesce(
    &mut self,
    bp: *mut u8,
  ) -> *mut u8 {
    unsafe {
      let prev_alloc = tag_alloc(get(footer(prev_block(bp))));
      let next_alloc = tag_alloc(get(header(next_block(bp))));
      let mut size = block_size(bp);
      let mut bp = bp;

      if prev_alloc && next_alloc {
        // Both neighbours allocated: nothing to merge.
      } else if prev_alloc && !next_alloc {
        // Absorb the next block.
        let next_bp = next_block(bp);
        self.delete_free(next_bp);
        size += block_size(next_bp);
        put(header(bp), pack(size, false));
        put(footer(bp), pack(size, false));
      } else if !prev_alloc && next_alloc {
        // The previous block absorbs this one.
        let prev_bp = prev_block(bp);
        self.delete_free(prev_bp);
        size += block_size(prev_bp);
        put(footer(bp), pack(size, false));
        put(header(prev_bp), pack(size, false));
        bp = prev_bp;
      } else {
        // The previous block absorbs both.
        let prev_bp = prev_block(bp);
        let next_bp = next_block(bp);
        self.delete_free(prev_bp);
        self.delete_free(next_bp);
        size += block_size(prev_bp) + block_size(next_bp);
        put(header(prev_bp), pack(size, false));
        put(footer(next_bp), pack(size, false));
        bp = prev_bp;
      }

      self.insert_free(bp);
      bp
    }
  }

  /// Pushes free block `bp` onto the head of the free list. O(1).
  unsafe fn insert_free(
    &mut self,
    bp: *mut u8,
  ) {
    unsafe {
      debug_assert!(!block_alloc(bp), "only free blocks enter the free list");

      set_next_free(bp, self.free_head);
      set_prev_free(bp, ptr::null_mut());

      if !self.free_head.is_null() {
        set_prev_free(self.free_head, bp);
      }

      self.free_head = bp;
    }
  }

  /// Unlinks block `bp` from the free list and clears its link words. O(1).
  unsafe fn delete_free(
    &mut self,
    bp: *mut u8,
  ) {
    unsafe {
      let prev = prev_free(bp);
      let next = next_free(bp);

      if !prev.is_null() {
        set_next_free(prev, next);
      } else {
        // bp was the head.
        self.free_head = next;
      }

      if !next.is_null() {
        set_prev_free(next, prev);
      }

      set_next_free(bp, ptr::null_mut());
      set_prev_free(bp, ptr::null_mut());
    }
  }

  /// Dumps one block's tags at debug level.
  unsafe fn log_block(
    &self,
    bp: *mut u8,
  ) {
    unsafe {
      let hword = get(header(bp));

      if tag_size(hword) == 0 {
        debug!("{bp:p}: epilogue");
        return;
      }

      let fword = get(footer(bp));
      debug!(
        "{:p}: header [{}:{}] footer [{}:{}]",
        bp,
        tag_size(hword),
        if tag_alloc(hword) { 'a' } else { 'f' },
        tag_size(fword),
        if tag_alloc(fword) { 'a' } else { 'f' },
      );
    }
  }

  /// Logs alignment and tag violations of one block.
  unsafe fn check_block(
    &self,
    bp: *mut u8,
  ) {
    unsafe {
      if bp as usize % WSIZE != 0 {
        error!("{bp:p}: payload is not word aligned");
      }
      if get(header(bp)) != get(footer(bp)) {
        error!("{bp:p}: header does not match footer");
      }
    }
  }
}
