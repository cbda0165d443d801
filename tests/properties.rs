//! Randomized operation sequences checked against a shadow model.
//!
//! The model tracks every live handle together with the exact bytes written
//! through it. After each operation the heap must agree with the model:
//! payloads intact, addresses aligned, ranges disjoint, and statistics
//! consistent with the set of live allocations.

use firstfit::{Handle, Heap, HeapError};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

#[derive(Clone, Debug)]
enum Op {
  Allocate { size: usize },
  AllocateZeroed { count: usize, element_size: usize },
  Resize { slot: usize, new_size: usize },
  Release { slot: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
  prop_oneof![
    (0usize..256).prop_map(|size| Op::Allocate { size }),
    ((0usize..32), (0usize..32))
      .prop_map(|(count, element_size)| Op::AllocateZeroed { count, element_size }),
    ((0usize..8), (0usize..256)).prop_map(|(slot, new_size)| Op::Resize { slot, new_size }),
    (0usize..8).prop_map(|slot| Op::Release { slot }),
  ]
}

fn check_against_model(
  heap: &Heap,
  live: &[(Handle, Vec<u8>)],
) -> Result<(), TestCaseError> {
  let mut ranges: Vec<(usize, usize)> = Vec::new();

  for (handle, pattern) in live {
    let payload = heap.payload(*handle).expect("live payload");
    prop_assert_eq!(pattern.as_slice(), payload);

    let addr = heap.payload_ptr(*handle).expect("live ptr").as_ptr() as usize;
    prop_assert_eq!(0, addr % 8);

    ranges.push((addr, pattern.len()));
  }

  ranges.sort();

  for pair in ranges.windows(2) {
    prop_assert!(pair[0].0 + pair[0].1 <= pair[1].0, "payload ranges overlap");
  }

  let stats = heap.stats();
  prop_assert_eq!(live.len(), stats.used_regions);
  prop_assert_eq!(
    live.iter().map(|(_, pattern)| pattern.len()).sum::<usize>(),
    stats.used_bytes
  );

  // No two adjacent free regions: the free count can exceed the used count
  // by at most one.
  prop_assert!(stats.free_regions <= stats.used_regions + 1);

  Ok(())
}

proptest! {
  #[test]
  fn heap_matches_shadow_model(ops in vec(op_strategy(), 1..64)) {
    let mut heap = Heap::new();
    let mut live: Vec<(Handle, Vec<u8>)> = Vec::new();
    let mut stamp: u8 = 0;
    let mut previous_total = 0;

    for op in ops {
      match op {
        Op::Allocate { size } => {
          let handle = heap.allocate(size).expect("allocate failed");
          let usable = heap.usable_size(handle).expect("usable_size failed");
          prop_assert!(usable >= size);

          stamp = stamp.wrapping_add(1);
          let pattern = vec![stamp; usable];
          heap.payload_mut(handle).expect("payload_mut failed").copy_from_slice(&pattern);
          live.push((handle, pattern));
        },
        Op::AllocateZeroed { count, element_size } => {
          match heap.allocate_zeroed(count, element_size) {
            Ok(handle) => {
              prop_assert!(count > 0 && element_size > 0);

              let payload = heap.payload(handle).expect("payload failed");
              prop_assert!(payload.iter().all(|byte| *byte == 0));
              prop_assert!(payload.len() >= count * element_size);

              stamp = stamp.wrapping_add(1);
              let pattern = vec![stamp; payload.len()];
              heap.payload_mut(handle).expect("payload_mut failed").copy_from_slice(&pattern);
              live.push((handle, pattern));
            },
            Err(HeapError::ZeroSized) => prop_assert!(count == 0 || element_size == 0),
            Err(HeapError::Overflow { .. }) => {
              prop_assert!(count.checked_mul(element_size).is_none());
            },
            Err(err) => prop_assert!(false, "unexpected allocate_zeroed error: {err}"),
          }
        },
        Op::Resize { slot, new_size } => {
          if live.is_empty() {
            continue;
          }

          let slot = slot % live.len();
          let (handle, pattern) = live[slot].clone();

          match heap.resize(Some(handle), new_size).expect("resize failed") {
            None => {
              prop_assert_eq!(0, new_size);
              live.remove(slot);
            },
            Some(resized) => {
              if new_size <= pattern.len() {
                // A shrink stays in place under the same handle.
                prop_assert_eq!(handle, resized);
              }

              let usable = heap.usable_size(resized).expect("usable_size failed");
              prop_assert!(usable >= new_size);

              let kept = pattern.len().min(usable);
              prop_assert_eq!(
                &pattern[..kept],
                &heap.payload(resized).expect("payload failed")[..kept]
              );

              let byte = pattern.first().copied().unwrap_or(0);
              let refreshed = vec![byte; usable];
              heap.payload_mut(resized).expect("payload_mut failed").copy_from_slice(&refreshed);
              live[slot] = (resized, refreshed);
            },
          }
        },
        Op::Release { slot } => {
          if live.is_empty() {
            continue;
          }

          let slot = slot % live.len();
          let (handle, _) = live.remove(slot);

          heap.release(handle);
          prop_assert!(matches!(heap.payload(handle), Err(HeapError::StaleHandle)));
        },
      }

      check_against_model(&heap, &live)?;

      // The arena never shrinks.
      let total = heap.stats().total_bytes();
      prop_assert!(total >= previous_total);
      previous_total = total;
    }
  }
}
