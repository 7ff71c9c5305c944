//! Work partitioning.

use std::ops::Range;

/// Split `[0, length)` into at most `workers` contiguous half-open ranges.
///
/// Ranges are disjoint, ordered, and cover the interval exactly. All ranges
/// have the same size except the last, which absorbs the remainder. An empty
/// interval yields no ranges; a worker count of zero is treated as one.
pub fn partition(length: usize, workers: usize) -> Vec<Range<usize>> {
    if length == 0 {
        return Vec::new();
    }
    let count = workers.clamp(1, length);
    let step = length / count;

    (0..count)
        .map(|i| {
            let start = i * step;
            let stop = if i + 1 == count { length } else { start + step };
            start..stop
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_length() {
        assert!(partition(0, 8).is_empty());
    }

    #[test]
    fn test_remainder_goes_to_last() {
        assert_eq!(partition(10, 4), vec![0..2, 2..4, 4..6, 6..10]);
    }

    #[test]
    fn test_more_workers_than_items() {
        assert_eq!(partition(3, 16), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_zero_workers() {
        assert_eq!(partition(5, 0), vec![0..5]);
    }

    proptest! {
        #[test]
        fn prop_ranges_cover_exactly(length in 0usize..5000, workers in 0usize..64) {
            let ranges = partition(length, workers);
            prop_assert!(ranges.len() <= workers.max(1));

            let mut next = 0;
            for r in &ranges {
                prop_assert_eq!(r.start, next);
                prop_assert!(r.start < r.end);
                next = r.end;
            }
            prop_assert_eq!(next, length);
        }
    }
}
