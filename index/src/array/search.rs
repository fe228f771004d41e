//! Search and filtering primitives over strided word slices.
//!
//! Positions passed to and returned from these functions are word offsets
//! into the slice, always aligned to the start of an entry.
//!
//! # Pre-conditions
//!
//! - `to - from` is a multiple of `stride`
//! - Entry keys in `[from, to)` are non-decreasing

use super::LongQueryBuffer;

/// Binary search for `key` among the entries in `words[from..to]`.
///
/// Returns `Ok(position)` of an entry whose key equals `key`, or
/// `Err(position)` of the first entry whose key is greater than `key`
/// (`to` if there is none).
#[must_use]
pub fn binary_search_n(
    words: &[u64],
    stride: usize,
    key: u64,
    from: usize,
    to: usize,
) -> Result<usize, usize> {
    debug_assert!(stride > 0);
    debug_assert_eq!((to - from) % stride, 0);

    let count = (to - from) / stride;
    let (mut low, mut high) = (0, count);
    while low < high {
        let mid = low + (high - low) / 2;
        if words[from + mid * stride] < key {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    let position = from + low * stride;

    if low < count && words[position] == key {
        Ok(position)
    } else {
        Err(position)
    }
}

/// First position in `words[from..to]` whose word is `>= key`, or `to`.
#[must_use]
pub fn binary_search_upper_bound(words: &[u64], key: u64, from: usize, to: usize) -> usize {
    from + words[from..to].partition_point(|&w| w < key)
}

/// Index of the first entry whose key is smaller than its predecessor's.
///
/// Returns `None` when the entries are sorted.
#[must_use]
pub fn first_unsorted_n(words: &[u64], stride: usize) -> Option<usize> {
    debug_assert!(stride > 0);

    words
        .chunks_exact(stride)
        .map(|e| e[0])
        .zip(words.chunks_exact(stride).skip(1).map(|e| e[0]))
        .position(|(prev, next)| next < prev)
        .map(|i| i + 1)
}

/// Keep buffer values that match an entry key in `words[from..to]`.
///
/// Starting at the buffer's read cursor, values that are present are retained
/// and values that are absent are rejected. The scan stops when the buffer is
/// exhausted, the range is exhausted, or the next value exceeds `boundary`.
/// Values above the boundary are left for the caller.
pub fn retain_n(
    buffer: &mut LongQueryBuffer,
    words: &[u64],
    stride: usize,
    boundary: u64,
    from: usize,
    to: usize,
) {
    let mut position = from;

    while buffer.has_more() && position < to {
        let value = buffer.current_value();
        if value > boundary {
            break;
        }

        let key = words[position];
        if value < key {
            buffer.reject_and_advance();
        } else if value == key {
            buffer.retain_and_advance();
        } else {
            position += stride;
        }
    }
}

/// Drop buffer values that match an entry key in `words[from..to]`.
///
/// The mirror image of [`retain_n`]: present values are rejected and absent
/// values are retained.
pub fn reject_n(
    buffer: &mut LongQueryBuffer,
    words: &[u64],
    stride: usize,
    boundary: u64,
    from: usize,
    to: usize,
) {
    let mut position = from;

    while buffer.has_more() && position < to {
        let value = buffer.current_value();
        if value > boundary {
            break;
        }

        let key = words[position];
        if value < key {
            buffer.retain_and_advance();
        } else if value == key {
            buffer.reject_and_advance();
        } else {
            position += stride;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_search_single_stride() {
        let words = [2, 4, 4, 8, 16];

        assert_eq!(binary_search_n(&words, 1, 8, 0, 5), Ok(3));
        assert_eq!(binary_search_n(&words, 1, 1, 0, 5), Err(0));
        assert_eq!(binary_search_n(&words, 1, 5, 0, 5), Err(3));
        assert_eq!(binary_search_n(&words, 1, 17, 0, 5), Err(5));

        // Duplicates resolve to the first occurrence
        assert_eq!(binary_search_n(&words, 1, 4, 0, 5), Ok(1));
    }

    #[test]
    fn test_binary_search_wide_stride_ignores_values() {
        // (key, value) pairs where values would sort differently from keys
        let words = [1, 900, 3, 0, 5, 700, 7, 1];

        assert_eq!(binary_search_n(&words, 2, 5, 0, 8), Ok(4));
        assert_eq!(binary_search_n(&words, 2, 6, 0, 8), Err(6));
        assert_eq!(binary_search_n(&words, 2, 700, 0, 8), Err(8));
    }

    #[test]
    fn test_binary_search_subrange() {
        let words = [1, 2, 3, 4, 5, 6, 7, 8];

        assert_eq!(binary_search_n(&words, 1, 2, 4, 8), Err(4));
        assert_eq!(binary_search_n(&words, 1, 6, 4, 8), Ok(5));
        assert_eq!(binary_search_n(&words, 1, 6, 4, 4), Err(4));
    }

    #[test]
    fn test_upper_bound() {
        let words = [10, 20, 30, 40, u64::MAX, u64::MAX];

        assert_eq!(binary_search_upper_bound(&words, 5, 0, 4), 0);
        assert_eq!(binary_search_upper_bound(&words, 20, 0, 4), 1);
        assert_eq!(binary_search_upper_bound(&words, 21, 0, 4), 2);
        assert_eq!(binary_search_upper_bound(&words, 41, 0, 4), 4);
        assert_eq!(binary_search_upper_bound(&words, 41, 0, 6), 4);
        assert_eq!(binary_search_upper_bound(&words, 25, 2, 4), 2);
    }

    #[test]
    fn test_first_unsorted() {
        assert_eq!(first_unsorted_n(&[], 1), None);
        assert_eq!(first_unsorted_n(&[1, 1, 2, 3], 1), None);
        assert_eq!(first_unsorted_n(&[1, 3, 2], 1), Some(2));
        assert_eq!(first_unsorted_n(&[1, 9, 2, 0, 3, 5], 2), None);
        assert_eq!(first_unsorted_n(&[5, 0, 2, 0], 2), Some(1));
    }

    #[test]
    fn test_retain_scan() {
        let words = [1, 5, 9, 13, 17];
        let mut buffer = LongQueryBuffer::new(vec![0, 1, 2, 9, 10, 17, 20]);

        retain_n(&mut buffer, &words, 1, u64::MAX, 0, words.len());

        // 20 is past the end of the range and is left for the caller
        assert!(buffer.has_more());
        assert_eq!(buffer.current_value(), 20);
        buffer.reject_and_advance();

        buffer.finalize_filtering();
        assert_eq!(buffer.as_slice(), &[1, 9, 17]);
    }

    #[test]
    fn test_retain_scan_stops_at_boundary() {
        let words = [1, 5, 9, 13];
        let mut buffer = LongQueryBuffer::new(vec![1, 5, 14, 15]);

        retain_n(&mut buffer, &words, 1, 13, 0, words.len());

        assert_eq!(buffer.current_value(), 14);
    }

    #[test]
    fn test_retain_scan_keeps_duplicates() {
        let words = [3, 7];
        let mut buffer = LongQueryBuffer::new(vec![3, 3, 7]);

        retain_n(&mut buffer, &words, 1, u64::MAX, 0, words.len());
        buffer.finalize_filtering();

        assert_eq!(buffer.as_slice(), &[3, 3, 7]);
    }

    #[test]
    fn test_reject_scan() {
        let words = [2, 0, 4, 0, 6, 0];
        let mut buffer = LongQueryBuffer::new(vec![1, 2, 3, 4, 5, 6]);

        reject_n(&mut buffer, &words, 2, u64::MAX, 0, words.len());
        buffer.finalize_filtering();

        assert_eq!(buffer.as_slice(), &[1, 3, 5]);
    }
}
