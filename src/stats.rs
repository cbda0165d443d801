//! Read-only heap usage summary.

use std::fmt;

/// Snapshot of the region sequence, summed across every tracked region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Number of regions in the sequence, live and free.
  pub total_regions: usize,
  /// Regions currently backing a live allocation.
  pub used_regions: usize,
  /// Regions available for reuse.
  pub free_regions: usize,
  /// Payload bytes across all in-use regions.
  pub used_bytes: usize,
  /// Payload bytes across all free regions.
  pub free_bytes: usize,
}

impl HeapStats {
  /// Every payload byte the heap tracks, used or free.
  pub fn total_bytes(&self) -> usize {
    self.used_bytes + self.free_bytes
  }

  /// Free share of all tracked bytes, as a percentage. `None` while the heap
  /// tracks no bytes at all.
  pub fn fragmentation(&self) -> Option<f64> {
    let total = self.total_bytes();

    if total == 0 {
      return None;
    }

    Some(self.free_bytes as f64 / total as f64 * 100.0)
  }
}

impl fmt::Display for HeapStats {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(f, "=========== Heap Statistics ===========")?;
    writeln!(f, "Total Blocks:       {}", self.total_regions)?;
    writeln!(f, "Used Blocks:        {}", self.used_regions)?;
    writeln!(f, "Free Blocks:        {}", self.free_regions)?;
    writeln!(f, "Used Memory (B):    {}", self.used_bytes)?;
    writeln!(f, "Free Memory (B):    {}", self.free_bytes)?;
    writeln!(f, "Total Memory (B):   {}", self.total_bytes())?;

    match self.fragmentation() {
      Some(share) => writeln!(f, "Fragmentation:      {share:.2}%")?,
      None => writeln!(f, "Fragmentation:      N/A")?,
    }

    writeln!(f, "=======================================")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fragmentation_is_undefined_without_bytes() {
    let stats = HeapStats::default();

    assert_eq!(None, stats.fragmentation());
    assert!(stats.to_string().contains("Fragmentation:      N/A"));
  }

  #[test]
  fn test_fragmentation_ratio() {
    let stats = HeapStats {
      total_regions: 3,
      used_regions: 2,
      free_regions: 1,
      used_bytes: 96,
      free_bytes: 32,
    };

    assert_eq!(128, stats.total_bytes());
    assert_eq!(Some(25.0), stats.fragmentation());
  }

  #[test]
  fn test_display_block() {
    let stats = HeapStats {
      total_regions: 1,
      used_regions: 0,
      free_regions: 1,
      used_bytes: 0,
      free_bytes: 64,
    };

    let block = stats.to_string();

    assert!(block.contains("Total Blocks:       1"));
    assert!(block.contains("Used Blocks:        0"));
    assert!(block.contains("Free Blocks:        1"));
    assert!(block.contains("Free Memory (B):    64"));
    assert!(block.contains("Total Memory (B):   64"));
    assert!(block.contains("Fragmentation:      100.00%"));
  }
}
