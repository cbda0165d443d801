//! The heap manager: first-fit search, splitting, coalescing, and resizing
//! over the region sequence.

use std::ptr::NonNull;

use tracing::{debug, error, trace, warn};

use crate::align::ALIGNMENT;
use crate::error::HeapError;
use crate::region::{Handle, Region, RegionState, RegionTable};
use crate::segment::Segment;
use crate::stats::HeapStats;
use crate::align;

/// Virtual address space reserved per heap unless
/// [`Heap::with_reservation`] asks for a different bound. Pages are only
/// committed as the heap grows into them.
pub const DEFAULT_RESERVATION: usize = 256 * 1024 * 1024;

/// A first-fit heap carved out of one contiguous, grow-only arena.
///
/// Each heap is an independent instance: it owns its own arena reservation
/// and descriptor table, and tears both down on drop. All operations are
/// synchronous and require `&mut self` for mutation; callers that need
/// cross-thread access wrap the whole heap in a mutex.
pub struct Heap {
  table: RegionTable,
  segment: Option<Segment>,
  reservation: usize,
}

// SAFETY: the heap exclusively owns its reservation and descriptor table,
// holds no interior mutability, and every mutation goes through `&mut self`.
unsafe impl Send for Heap {}
unsafe impl Sync for Heap {}

impl Default for Heap {
  fn default() -> Self {
    Self::new()
  }
}

impl Heap {
  /// Creates an empty heap. The arena reservation is made lazily, on the
  /// first allocation that needs arena bytes no existing region can supply.
  pub fn new() -> Self {
    Self::with_reservation(DEFAULT_RESERVATION)
  }

  /// Creates an empty heap whose arena may grow up to `limit` bytes.
  pub fn with_reservation(limit: usize) -> Self {
    Self {
      table: RegionTable::new(),
      segment: None,
      reservation: limit,
    }
  }

  /// Allocates at least `size` bytes of 8-byte-aligned memory. The content
  /// of the payload is unspecified.
  ///
  /// A zero-byte request succeeds and yields a distinct live handle with an
  /// empty payload; this is the one zero-size policy the crate implements.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Handle, HeapError> {
    let index = self.allocate_index(align!(size))?;
    Ok(self.table.mint(index))
  }

  /// Allocates `count * element_size` bytes and zero-fills the whole usable
  /// payload. A zero count or element size is rejected, as is a product
  /// that overflows `usize`; neither leaves any side effect.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    element_size: usize,
  ) -> Result<Handle, HeapError> {
    if count == 0 || element_size == 0 {
      return Err(HeapError::ZeroSized);
    }

    let total = count
      .checked_mul(element_size)
      .ok_or(HeapError::Overflow { count, element_size })?;

    let index = self.allocate_index(align!(total))?;

    let (offset, size) = {
      let region = self.table.region(index);
      (region.offset, region.size)
    };

    if let Some(segment) = self.segment.as_mut() {
      segment.zero(offset, size);
    }

    Ok(self.table.mint(index))
  }

  /// Resizes an allocation.
  ///
  /// - `None` behaves as [`allocate`](Self::allocate).
  /// - `new_size == 0` releases the block and returns `Ok(None)`.
  /// - A shrink stays in place and returns the handle unchanged, carving the
  ///   freed tail into a new free region when at least [`ALIGNMENT`] bytes
  ///   remain.
  /// - A grow allocates a fresh region, copies the old usable bytes, and
  ///   releases the original. If the fresh allocation fails the original
  ///   block is left untouched.
  pub fn resize(
    &mut self,
    handle: Option<Handle>,
    new_size: usize,
  ) -> Result<Option<Handle>, HeapError> {
    let Some(handle) = handle else {
      return self.allocate(new_size).map(Some);
    };

    if new_size == 0 {
      self.release(handle);
      return Ok(None);
    }

    let Some(index) = self.table.resolve(handle) else {
      warn!(target: "heap", "resize of a stale handle rejected");
      return Err(HeapError::StaleHandle);
    };

    let aligned = align!(new_size);

    let (offset, size) = {
      let region = self.table.region(index);
      (region.offset, region.size)
    };

    if aligned <= size {
      if let Some(carved) = self.split_tail(index, aligned) {
        self.coalesce_forward(carved);
      }

      return Ok(Some(handle));
    }

    // The fresh region is fully allocated before the original is touched,
    // so a failed growth leaves the old block valid.
    let new_index = self.allocate_index(aligned)?;
    let new_offset = self.table.region(new_index).offset;

    if let Some(segment) = self.segment.as_mut() {
      segment.copy(offset, new_offset, size);
    }

    self.release_at(index);

    trace!(target: "heap", from = offset, to = new_offset, copied = size, "relocated region");

    Ok(Some(self.table.mint(new_index)))
  }

  /// Releases an allocation and merges it with every contiguous free
  /// neighbor. A stale handle is reported and ignored.
  pub fn release(
    &mut self,
    handle: Handle,
  ) {
    let Some(index) = self.table.resolve(handle) else {
      warn!(target: "heap", "release of a stale handle ignored");
      return;
    };

    self.release_at(index);
  }

  /// Usable bytes of a live allocation; at least the requested size.
  pub fn usable_size(
    &self,
    handle: Handle,
  ) -> Result<usize, HeapError> {
    let index = self.table.resolve(handle).ok_or(HeapError::StaleHandle)?;
    Ok(self.table.region(index).size)
  }

  /// The payload bytes of a live allocation.
  pub fn payload(
    &self,
    handle: Handle,
  ) -> Result<&[u8], HeapError> {
    let index = self.table.resolve(handle).ok_or(HeapError::StaleHandle)?;
    let region = self.table.region(index);

    match self.segment.as_ref() {
      Some(segment) => Ok(segment.slice(region.offset, region.size)),
      None => {
        debug_assert_eq!(0, region.size);
        Ok(&[])
      },
    }
  }

  /// The payload bytes of a live allocation, writable.
  pub fn payload_mut(
    &mut self,
    handle: Handle,
  ) -> Result<&mut [u8], HeapError> {
    let index = self.table.resolve(handle).ok_or(HeapError::StaleHandle)?;

    let (offset, size) = {
      let region = self.table.region(index);
      (region.offset, region.size)
    };

    match self.segment.as_mut() {
      Some(segment) => Ok(segment.slice_mut(offset, size)),
      None => {
        debug_assert_eq!(0, size);
        Ok(&mut [])
      },
    }
  }

  /// The 8-byte-aligned address of a live allocation's payload start.
  pub fn payload_ptr(
    &self,
    handle: Handle,
  ) -> Result<NonNull<u8>, HeapError> {
    let index = self.table.resolve(handle).ok_or(HeapError::StaleHandle)?;
    let region = self.table.region(index);

    match self.segment.as_ref() {
      Some(segment) => Ok(segment.ptr(region.offset)),
      None => {
        debug_assert_eq!(0, region.size);
        Ok(NonNull::<u64>::dangling().cast())
      },
    }
  }

  /// Sums usage across every region in the sequence. Read-only.
  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats::default();

    for region in self.table.regions() {
      stats.total_regions += 1;

      match region.state {
        RegionState::InUse => {
          stats.used_regions += 1;
          stats.used_bytes += region.size;
        },
        RegionState::Free => {
          stats.free_regions += 1;
          stats.free_bytes += region.size;
        },
      }
    }

    stats
  }

  /// Writes the human-readable statistics block to the diagnostic stream.
  pub fn report_statistics(&self) {
    eprint!("{}", self.stats());
  }

  /// First-fit search over the sequence; grows the arena when no free
  /// region is large enough. `aligned` is already a multiple of 8.
  fn allocate_index(
    &mut self,
    aligned: usize,
  ) -> Result<usize, HeapError> {
    let mut cursor = self.table.head();

    while let Some(index) = cursor {
      let (state, size, next) = {
        let region = self.table.region(index);
        (region.state, region.size, region.next)
      };

      if state == RegionState::Free && size >= aligned {
        self.table.region_mut(index).state = RegionState::InUse;
        self.split_tail(index, aligned);

        trace!(target: "heap", size = aligned, index, "reused free region");
        return Ok(index);
      }

      cursor = next;
    }

    let offset = self.grow_arena(aligned)?;
    let index = self
      .table
      .push_back(Region::new(offset, aligned, RegionState::InUse));

    trace!(target: "heap", size = aligned, offset, "appended region after growth");
    Ok(index)
  }

  /// Extends the arena by exactly `bytes`, reserving it first if this is the
  /// heap's first growth event. Failures are reported and never retried.
  fn grow_arena(
    &mut self,
    bytes: usize,
  ) -> Result<usize, HeapError> {
    // A zero-byte region ahead of the first real growth needs no arena.
    if bytes == 0 && self.segment.is_none() {
      return Ok(0);
    }

    let reservation = self.reservation;

    let segment = match &mut self.segment {
      Some(segment) => segment,
      vacant => vacant.insert(
        Segment::reserve(reservation)
          .inspect_err(|err| error!(target: "heap", %err, "arena reservation failed"))?,
      ),
    };

    segment
      .grow(bytes)
      .inspect(|offset| debug!(target: "heap", bytes, offset = *offset, "arena extended"))
      .inspect_err(|err| error!(target: "heap", %err, "arena growth failed"))
  }

  /// Carves the bytes past `keep` into a new free region spliced in after
  /// `index`, when at least [`ALIGNMENT`] payload bytes remain. Smaller
  /// remainders stay inside the region as waste.
  fn split_tail(
    &mut self,
    index: usize,
    keep: usize,
  ) -> Option<usize> {
    let (offset, size) = {
      let region = self.table.region(index);
      (region.offset, region.size)
    };

    let remainder = size - keep;

    if remainder < ALIGNMENT {
      return None;
    }

    self.table.region_mut(index).size = keep;

    let carved = self
      .table
      .splice_after(index, Region::new(offset + keep, remainder, RegionState::Free));

    trace!(target: "heap", index, keep, remainder, "split region");
    Some(carved)
  }

  fn release_at(
    &mut self,
    index: usize,
  ) {
    trace!(target: "heap", index, "released region");

    self.table.region_mut(index).state = RegionState::Free;
    self.coalesce_forward(index);
    self.coalesce_backward(index);
  }

  /// Absorbs every free successor of `index` into it.
  fn coalesce_forward(
    &mut self,
    index: usize,
  ) {
    while let Some(next) = self.table.region(index).next {
      if self.table.region(next).state != RegionState::Free {
        break;
      }

      let absorbed = self.table.region(next).size;
      self.table.region_mut(index).size += absorbed;
      self.table.remove(next);

      trace!(target: "heap", index, absorbed, "absorbed free successor");
    }
  }

  /// Lets a free predecessor absorb `index`, walking left while the
  /// boundary region stays free.
  fn coalesce_backward(
    &mut self,
    mut index: usize,
  ) {
    while let Some(prev) = self.table.region(index).prev {
      if self.table.region(prev).state != RegionState::Free {
        break;
      }

      let absorbed = self.table.region(index).size;
      self.table.region_mut(prev).size += absorbed;
      self.table.remove(index);

      trace!(target: "heap", index = prev, absorbed, "absorbed into free predecessor");
      index = prev;
    }
  }
}
