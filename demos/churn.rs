//! Fixed-size churn benchmark.
//!
//! Performs 100 000 allocate/deallocate pairs of 32-byte payloads against
//! the explicit free list allocator and then against the system allocator,
//! and prints both timings. Afterwards the heap is checked for consistency;
//! any violation is reported through the logger installed below.
//!
//! Run with:
//!
//! ```text
//! cargo run --example churn
//! ```

use std::alloc::{Layout, alloc as system_alloc, dealloc as system_dealloc};
use std::time::Instant;

use exallocator::{ExplicitAllocator, SbrkSource};

const N: usize = 100_000;
const PAYLOAD: u32 = 32;

/// Minimal logger forwarding the allocator's diagnostics to stderr.
struct StderrLogger;

impl log::Log for StderrLogger {
  fn enabled(
    &self,
    _metadata: &log::Metadata,
  ) -> bool {
    true
  }

  fn log(
    &self,
    record: &log::Record,
  ) {
    eprintln!("[{}] {}", record.level(), record.args());
  }

  fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
  log::set_logger(&LOGGER).expect("logger already installed");
  log::set_max_level(log::LevelFilter::Warn);

  let mut heap =
    unsafe { ExplicitAllocator::init(SbrkSource) }.expect("initial heap extension failed");

  // Preallocate the pointer buffer up front so the system allocator does
  // not move the program break in the middle of the run.
  let mut ptrs = Vec::with_capacity(N);

  // Benchmark the explicit list allocator.
  let start = Instant::now();
  unsafe {
    for _ in 0..N {
      let p = heap.allocate(PAYLOAD);
      assert!(!p.is_null(), "heap exhausted");
      ptrs.push(p);
    }
    for p in ptrs.drain(..) {
      heap.deallocate(p);
    }
  }
  let explicit_elapsed = start.elapsed();

  // Benchmark the system allocator on the same workload.
  let layout = Layout::from_size_align(PAYLOAD as usize, 8).unwrap();
  let start = Instant::now();
  unsafe {
    for _ in 0..N {
      let p = system_alloc(layout);
      assert!(!p.is_null(), "system allocator failed");
      ptrs.push(p);
    }
    for p in ptrs.drain(..) {
      system_dealloc(p, layout);
    }
  }
  let system_elapsed = start.elapsed();

  println!(
    "explicit list allocator: {:.6} sec ({} pairs of {} bytes)",
    explicit_elapsed.as_secs_f64(),
    N,
    PAYLOAD,
  );
  println!(
    "system allocator:        {:.6} sec ({} pairs of {} bytes)",
    system_elapsed.as_secs_f64(),
    N,
    PAYLOAD,
  );

  // The churn must leave the heap structurally sound; violations show up
  // on stderr through the logger.
  unsafe {
    heap.checkheap(false);
  }
}
