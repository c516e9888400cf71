//! Fixed contiguous partitioning of the dataset across groups
//!
//! Boundaries are a pure function of the dataset length and
//! [`GROUP_COUNT`](crate::GROUP_COUNT), recomputed on every start:
//!
//! ```text
//! batch_size = len / GROUP_COUNT
//! group g    = [(g - 1) * batch_size, min(g * batch_size, len))
//! ```
//!
//! Rows past `GROUP_COUNT * batch_size` belong to no group.

use crate::GROUP_COUNT;
use std::ops::Range;

/// Partition layout for a dataset of a given length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitions {
    len: usize,
    batch_size: usize,
}

impl Partitions {
    /// Compute partitions for a dataset of `len` rows
    pub fn new(len: usize) -> Self {
        Self {
            len,
            batch_size: len / GROUP_COUNT,
        }
    }

    /// Nominal size of each partition
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Row range of a group; `group` must be in `1..=GROUP_COUNT`
    pub fn range(&self, group: usize) -> Range<usize> {
        debug_assert!((1..=GROUP_COUNT).contains(&group));
        let start = ((group - 1) * self.batch_size).min(self.len);
        let end = (group * self.batch_size).min(self.len);
        start..end
    }

    /// Number of rows drawn per request: a tenth of the batch, at least one
    pub fn required_sample_size(&self) -> usize {
        (self.batch_size / 10).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        let partitions = Partitions::new(1000);
        assert_eq!(partitions.batch_size(), 100);
        assert_eq!(partitions.range(1), 0..100);
        assert_eq!(partitions.range(3), 200..300);
        assert_eq!(partitions.range(10), 900..1000);
        assert_eq!(partitions.required_sample_size(), 10);
    }

    #[test]
    fn test_remainder_rows_unassigned() {
        let partitions = Partitions::new(1009);
        assert_eq!(partitions.range(10), 900..1000);
    }

    #[test]
    fn test_partitions_are_disjoint() {
        let partitions = Partitions::new(537);
        for group in 1..GROUP_COUNT {
            assert_eq!(partitions.range(group).end, partitions.range(group + 1).start);
        }
    }

    #[test]
    fn test_tiny_dataset() {
        let partitions = Partitions::new(7);
        assert_eq!(partitions.batch_size(), 0);
        assert!(partitions.range(1).is_empty());
        assert_eq!(partitions.required_sample_size(), 1);
    }

    #[test]
    fn test_small_batches_sample_one() {
        let partitions = Partitions::new(50);
        assert_eq!(partitions.range(2).len(), 5);
        assert_eq!(partitions.required_sample_size(), 1);
    }
}
