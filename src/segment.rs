//! The arena extent: one contiguous virtual-address reservation that only
//! ever grows.
//!
//! The segment reserves its whole address range up front with
//! `mmap(PROT_NONE)` and commits pages on demand with `mprotect` as the heap
//! asks for more room. Committing page by page keeps successive growth events
//! contiguous, which the region sequence relies on. Nothing is handed back to
//! the host until the segment is dropped.

use std::io;
use std::ptr::{self, NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE, c_void};

use crate::error::HeapError;

pub(crate) struct Segment {
  base: NonNull<u8>,
  limit: usize,
  committed: usize,
  page_committed: usize,
  page_size: usize,
}

fn round_up_to(
  value: usize,
  granularity: usize,
) -> usize {
  value.saturating_add(granularity - 1) & !(granularity - 1)
}

impl Segment {
  /// Reserves `limit` bytes of address space (rounded up to whole pages).
  /// No memory is committed yet.
  pub fn reserve(limit: usize) -> Result<Self, HeapError> {
    // SAFETY: querying a constant system parameter.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let page_size = if page_size > 0 { page_size as usize } else { 4096 };

    let limit = round_up_to(limit, page_size);

    // SAFETY: a fresh anonymous PROT_NONE mapping; no existing mapping is
    // touched and the kernel picks the address.
    let base = unsafe {
      libc::mmap(
        ptr::null_mut(),
        limit,
        PROT_NONE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if base == MAP_FAILED {
      return Err(HeapError::Growth {
        requested: limit,
        source: io::Error::last_os_error(),
      });
    }

    let base = NonNull::new(base.cast::<u8>()).ok_or_else(|| HeapError::Growth {
      requested: limit,
      source: io::Error::other("host mapped the null page"),
    })?;

    Ok(Self {
      base,
      limit,
      committed: 0,
      page_committed: 0,
      page_size,
    })
  }

  /// Commits `bytes` more bytes at the growth watermark and returns the
  /// offset of the new extent. A zero-byte growth is a watermark no-op.
  pub fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<usize, HeapError> {
    let offset = self.committed;

    let end = match self.committed.checked_add(bytes) {
      Some(end) if end <= self.limit => end,
      _ => {
        return Err(HeapError::Exhausted {
          requested: bytes,
          limit: self.limit,
        });
      },
    };

    if end > self.page_committed {
      let delta = round_up_to(end - self.page_committed, self.page_size);

      // SAFETY: [page_committed, page_committed + delta) lies inside the
      // reservation this segment owns; `limit` is page-rounded, so `delta`
      // never reaches past it.
      let rc = unsafe {
        libc::mprotect(
          self.base.as_ptr().add(self.page_committed).cast::<c_void>(),
          delta,
          PROT_READ | PROT_WRITE,
        )
      };

      if rc != 0 {
        return Err(HeapError::Growth {
          requested: bytes,
          source: io::Error::last_os_error(),
        });
      }

      self.page_committed += delta;
    }

    self.committed = end;
    Ok(offset)
  }

  /// Address of the byte at `offset`. The address is not dereferenced here.
  pub fn ptr(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    debug_assert!(offset <= self.committed);

    // SAFETY: the offset stays inside the reservation, so the add cannot
    // wrap and the result cannot be null.
    unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
  }

  pub fn slice(
    &self,
    offset: usize,
    len: usize,
  ) -> &[u8] {
    debug_assert!(offset + len <= self.committed);

    // SAFETY: the whole range is committed read/write memory owned by this
    // segment, and the shared borrow of `self` keeps it mapped.
    unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(offset), len) }
  }

  pub fn slice_mut(
    &mut self,
    offset: usize,
    len: usize,
  ) -> &mut [u8] {
    debug_assert!(offset + len <= self.committed);

    // SAFETY: as in `slice`, plus the exclusive borrow of `self` makes this
    // the only live view into the range.
    unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len) }
  }

  pub fn zero(
    &mut self,
    offset: usize,
    len: usize,
  ) {
    self.slice_mut(offset, len).fill(0);
  }

  /// Copies `len` bytes between two disjoint committed ranges.
  pub fn copy(
    &mut self,
    src: usize,
    dst: usize,
    len: usize,
  ) {
    debug_assert!(src + len <= self.committed);
    debug_assert!(dst + len <= self.committed);
    debug_assert!(src + len <= dst || dst + len <= src);

    // SAFETY: both ranges are committed and belong to distinct regions, so
    // they cannot overlap.
    unsafe {
      ptr::copy_nonoverlapping(
        self.base.as_ptr().add(src),
        self.base.as_ptr().add(dst),
        len,
      );
    }
  }
}

impl Drop for Segment {
  fn drop(&mut self) {
    // SAFETY: unmapping the reservation this segment created in `reserve`.
    unsafe {
      libc::munmap(self.base.as_ptr().cast::<c_void>(), self.limit);
    }
  }
}
