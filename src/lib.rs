//! # exallocator - An Explicit Free List Memory Allocator
//!
//! This crate provides a classic **malloc-style heap allocator** built on an
//! explicit doubly-linked free list with boundary-tag coalescing. It manages
//! one contiguous heap region grown on demand through an `sbrk`-like
//! primitive and offers the three classic operations (allocate, deallocate,
//! and reallocate) over raw byte payloads with stable addresses.
//!
//! ## Overview
//!
//! ```text
//!   Heap structure:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          HEAP MEMORY                                 │
//!   │                                                                      │
//!   │  ┌────┬──────────┬──────┬──────────┬──────┬──────────────┬────────┐  │
//!   │  │pad │ prologue │ used │   free   │ used │     free     │epilogue│  │
//!   │  └────┴──────────┴──────┴──────────┴──────┴──────────────┴────────┘  │
//!   │                            │                  ▲ │            ▲       │
//!   │                            └── free list ─────┘ └─ links ────┘       │
//!   │                                                                      │
//!   │  Every block carries a size|alloc tag at both ends, so physical      │
//!   │  neighbours are one address computation away in either direction.    │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Freed blocks are merged *eagerly* with free physical neighbours and
//! pushed onto the head of the free list, so recently freed memory is
//! reused first. Allocation scans the list first-fit and splits the winning
//! block when the remainder is big enough to stand on its own.
//!
//! ## Crate Structure
//!
//! ```text
//!   exallocator
//!   ├── align      - Word-alignment macros (align!, align_to!)
//!   ├── block      - Boundary tags and block address arithmetic (internal)
//!   ├── source     - Heap growth seam (HeapSource, SbrkSource, ArenaSource)
//!   └── explicit   - ExplicitAllocator implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use exallocator::{ExplicitAllocator, SbrkSource};
//!
//! fn main() {
//!     let mut heap = unsafe { ExplicitAllocator::init(SbrkSource) }
//!         .expect("initial heap extension failed");
//!
//!     unsafe {
//!         // Allocate 64 payload bytes.
//!         let p = heap.allocate(64);
//!
//!         // Use the memory.
//!         p.write_bytes(0x2A, 64);
//!
//!         // A larger copy of the same payload.
//!         let q = heap.reallocate(p, 256);
//!
//!         // Free the memory.
//!         heap.deallocate(q);
//!     }
//! }
//! ```
//!
//! ## How It Works
//!
//! The allocator obtains memory through the [`HeapSource`] trait, whose
//! contract mirrors `sbrk(2)`: grow a contiguous region by some bytes and
//! return the previous end. [`SbrkSource`] moves the real program break;
//! [`ArenaSource`] serves spans of a fixed in-process buffer, which keeps
//! tests deterministic and makes independent heap arenas possible.
//!
//! ```text
//!   Request path:
//!
//!   allocate(n) ──► adjust size ──► first-fit scan ──┬─ hit ──► place/split
//!                  (8-byte words,    of free list    │
//!                   +16 overhead,                    └─ miss ─► extend heap
//!                   min 32)                                     coalesce
//!                                                               place/split
//!
//!   deallocate(p) ──► mark free ──► merge with free physical ──► push on
//!                                   neighbours (4 cases)         list head
//! ```
//!
//! The heap is bracketed by allocated sentinel blocks, a 16-byte prologue
//! and a zero-size epilogue, so the merge logic never inspects an address
//! outside the heap and needs no edge-case branches.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives; wrap the
//!   allocator externally if it must be shared.
//! - **Monotonic heap**: memory is never returned to the operating system;
//!   process teardown reclaims everything.
//! - **No pointer validation**: double frees and foreign pointers corrupt
//!   the heap, exactly as with `malloc(3)`.
//! - **Unix-only** when using [`SbrkSource`] (requires `libc` and `sbrk`);
//!   [`ArenaSource`] works anywhere.
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! All allocation and deallocation operations require `unsafe` blocks.

pub mod align;
mod block;
mod explicit;
mod source;

pub use explicit::ExplicitAllocator;
pub use source::{ArenaSource, HeapSource, SbrkSource};
