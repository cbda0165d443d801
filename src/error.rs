use std::io;

use thiserror::Error;

/// Errors surfaced by [`Heap`](crate::Heap) operations.
///
/// Every failure is returned to the immediate caller; the heap never retries
/// a failed growth and never terminates the process.
#[derive(Debug, Error)]
pub enum HeapError {
  /// The arena reservation cannot cover another growth event.
  #[error("heap growth of {requested} bytes rejected: reservation of {limit} bytes exhausted")]
  Exhausted { requested: usize, limit: usize },

  /// The host mapping primitive refused to reserve or commit memory.
  #[error("heap growth of {requested} bytes failed")]
  Growth {
    requested: usize,
    #[source]
    source: io::Error,
  },

  /// Zeroed allocation called with a zero element count or element size.
  #[error("zeroed allocation requires a non-zero element count and size")]
  ZeroSized,

  /// `count * element_size` does not fit in `usize`.
  #[error("{count} elements of {element_size} bytes overflow the address space")]
  Overflow { count: usize, element_size: usize },

  /// The handle does not name a live allocation: it was released, relocated
  /// by a resize, or absorbed into a neighbor.
  #[error("handle does not name a live allocation")]
  StaleHandle,
}
