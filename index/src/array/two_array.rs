//! Operations over pairs of sorted strided arrays.

/// Count the distinct entry keys in the union of `left` and `right`.
///
/// Both inputs must be sorted by key and hold whole entries of `stride` words.
#[must_use]
pub fn count_distinct_n(left: &[u64], right: &[u64], stride: usize) -> usize {
    debug_assert!(stride > 0);

    let mut count = 0;
    let mut last = None;

    for (source, position) in MergeOrder::new(left, right, stride) {
        let key = source[position];
        if last != Some(key) {
            count += 1;
            last = Some(key);
        }
    }

    count
}

/// Write the sorted union of `left` and `right` into `out`.
///
/// Each distinct key is written once. When a key occurs more than once, the
/// first occurrence (preferring `left`) is written and each later occurrence's
/// value words are folded in with `combine(written, incoming)`. For
/// `stride == 1` there are no value words and `combine` is never called.
///
/// Returns the number of words written, which is `stride` times
/// [`count_distinct_n`] of the same inputs.
///
/// # Panics
///
/// Panics if `out` is too small to hold the union.
pub fn merge_arrays_n<F>(
    out: &mut [u64],
    left: &[u64],
    right: &[u64],
    stride: usize,
    mut combine: F,
) -> usize
where
    F: FnMut(u64, u64) -> u64,
{
    debug_assert!(stride > 0);

    let mut written = 0;

    for (source, position) in MergeOrder::new(left, right, stride) {
        let entry = &source[position..position + stride];

        if written > 0 && out[written - stride] == entry[0] {
            let target = &mut out[written - stride..written];
            for (slot, &incoming) in target.iter_mut().zip(entry).skip(1) {
                *slot = combine(*slot, incoming);
            }
        } else {
            out[written..written + stride].copy_from_slice(entry);
            written += stride;
        }
    }

    written
}

/// Visits entries of two sorted arrays in key order, `left` first on ties.
struct MergeOrder<'a> {
    left: &'a [u64],
    right: &'a [u64],
    stride: usize,
    left_pos: usize,
    right_pos: usize,
}

impl<'a> MergeOrder<'a> {
    const fn new(left: &'a [u64], right: &'a [u64], stride: usize) -> Self {
        Self {
            left,
            right,
            stride,
            left_pos: 0,
            right_pos: 0,
        }
    }
}

impl<'a> Iterator for MergeOrder<'a> {
    type Item = (&'a [u64], usize);

    fn next(&mut self) -> Option<Self::Item> {
        let left_done = self.left_pos >= self.left.len();
        let right_done = self.right_pos >= self.right.len();

        let take_left = match (left_done, right_done) {
            (true, true) => return None,
            (false, true) => true,
            (true, false) => false,
            (false, false) => self.left[self.left_pos] <= self.right[self.right_pos],
        };

        if take_left {
            let position = self.left_pos;
            self.left_pos += self.stride;
            Some((self.left, position))
        } else {
            let position = self.right_pos;
            self.right_pos += self.stride;
            Some((self.right, position))
        }
    }
}
