use firstfit::{Heap, HeapError};
use tracing_subscriber::EnvFilter;

/// Walks the heap through the full operation surface: allocate, zeroed
/// allocate, resize, and release, printing the statistics block after each
/// step. Run with `RUST_LOG=heap=trace` to watch the split/coalesce events.
fn main() -> Result<(), HeapError> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("heap=debug")))
    .compact()
    .init();

  println!("----- first-fit heap demo -----");

  let mut heap = Heap::new();

  // --------------------------------------------------------------------
  // 1) Allocate 32 bytes and write a string into them.
  // --------------------------------------------------------------------
  let text = b"Hello, first-fit heap!";
  let first = heap.allocate(32)?;

  heap.payload_mut(first)?[..text.len()].copy_from_slice(text);
  println!(
    "\n[1] first: {:?}",
    std::str::from_utf8(&heap.payload(first)?[..text.len()]).unwrap_or("<invalid utf8>")
  );
  heap.report_statistics();

  // --------------------------------------------------------------------
  // 2) Allocate four zeroed 4-byte elements (the calloc shape).
  // --------------------------------------------------------------------
  let array = heap.allocate_zeroed(4, 4)?;

  println!("[2] array: {:?}", heap.payload(array)?);
  heap.report_statistics();

  // --------------------------------------------------------------------
  // 3) Grow the first block to 64 bytes; the text moves with it.
  // --------------------------------------------------------------------
  let first = heap.resize(Some(first), 64)?.expect("non-zero resize returns a handle");
  let tail = b" Extended!";

  heap.payload_mut(first)?[text.len()..text.len() + tail.len()].copy_from_slice(tail);
  println!(
    "[3] first after resize: {:?}",
    std::str::from_utf8(&heap.payload(first)?[..text.len() + tail.len()]).unwrap_or("<invalid utf8>")
  );
  heap.report_statistics();

  // --------------------------------------------------------------------
  // 4) Release both blocks. Everything coalesces into one free region,
  //    so fragmentation reads 100%.
  // --------------------------------------------------------------------
  heap.release(first);
  heap.release(array);
  heap.report_statistics();

  Ok(())
}
