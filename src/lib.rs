//! # firstfit - A First-Fit Heap Manager
//!
//! This crate implements a classic **first-fit free-list allocator**: memory
//! blocks are carved out of one contiguous, grow-only arena, recycled through
//! an address-ordered region sequence, split when oversized, and merged with
//! their neighbors when released.
//!
//! ## Overview
//!
//! ```text
//!   Arena and region sequence:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         ARENA (grow-only)                            │
//!   │                                                                      │
//!   │   ┌────────┬────────┬──────────────┬────────┬───────────────────┐    │
//!   │   │ in use │  free  │    in use    │ in use │    uncommitted    │    │
//!   │   └────────┴────────┴──────────────┴────────┴───────────────────┘    │
//!   │        ▲                                     ▲                       │
//!   │        │                                     │                       │
//!   │    regions tile the committed          growth watermark              │
//!   │    extent with no gaps                 (next growth event)           │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Descriptors live out-of-band in a slot table, so payload bytes carry
//!   no headers:
//!
//!   slot table:   [0] ──► { offset: 0,  size: 32, in use, next: 1 }
//!                 [1] ──► { offset: 32, size: 16, free,   next: 2, prev: 0 }
//!                 [2] ──► { offset: 48, size: 64, in use, prev: 1 }
//! ```
//!
//! Allocation scans the sequence from the head and takes the first free
//! region large enough (first-fit), splitting off any remainder as a new
//! free region. Release flips the region to free and coalesces it with free
//! neighbors on both sides, so no two adjacent regions are ever both free.
//! When no region fits, the arena grows by exactly the aligned request.
//!
//! ## Crate Structure
//!
//! ```text
//!   firstfit
//!   ├── align      - Alignment granularity and the align! macro
//!   ├── error      - HeapError
//!   ├── region     - Region descriptors, handles, and the slot table
//!   ├── segment    - The arena extent (mmap reservation, mprotect commits)
//!   ├── heap       - Heap: allocate / allocate_zeroed / resize / release
//!   └── stats      - HeapStats reporting
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use firstfit::Heap;
//!
//! fn main() -> Result<(), firstfit::HeapError> {
//!   let mut heap = Heap::new();
//!
//!   // Allocate 32 bytes and write through the handle.
//!   let block = heap.allocate(32)?;
//!   heap.payload_mut(block)?[..5].copy_from_slice(b"hello");
//!
//!   // Grow it; the contents move with the block.
//!   let block = heap.resize(Some(block), 64)?.ok_or(firstfit::HeapError::StaleHandle)?;
//!   assert_eq!(b"hello", &heap.payload(block)?[..5]);
//!
//!   heap.release(block);
//!   assert_eq!(0, heap.stats().used_regions);
//!   Ok(())
//! }
//! ```
//!
//! ## Handles Instead of Raw Pointers
//!
//! Every allocation is named by an opaque [`Handle`]: a slot index plus a
//! generation counter into the descriptor table. Releasing a block, growing
//! it to a new location, or merging it into a neighbor advances the
//! generation, so a stale handle is detected and rejected rather than
//! silently reading someone else's memory. The raw 8-byte-aligned payload
//! address is still available through [`Heap::payload_ptr`] when address
//! arithmetic matters.
//!
//! ## How the Arena Grows
//!
//! The heap reserves a span of virtual address space up front
//! (`mmap(PROT_NONE)`, 256 MiB by default) and commits pages into it with
//! `mprotect` as allocations outgrow the existing regions. Growth is
//! monotonic: the arena never shrinks and nothing is returned to the host
//! until the heap is dropped. A growth request past the reservation fails
//! with [`HeapError::Exhausted`] and leaves the heap fully usable.
//!
//! ## Limitations
//!
//! - **Single-threaded operations**: no internal synchronization; wrap the
//!   heap in a mutex if it must be shared.
//! - **No address space reuse**: freed regions are recycled, but the arena
//!   footprint only grows while the heap lives.
//! - **First-fit only**: no size classes, no best-fit heuristics.
//! - **Unix-only**: requires `libc` (`mmap`/`mprotect`, POSIX systems).

pub mod align;
mod error;
mod heap;
mod region;
mod segment;
mod stats;

pub use error::HeapError;
pub use heap::{DEFAULT_RESERVATION, Heap};
pub use region::Handle;
pub use stats::HeapStats;
