//! Merging two trees into a new tree.
//!
//! Both merges produce the sorted union of the input keys with each key once.
//! Neither modifies its inputs.

use super::{BTreeError, BTreeReader, BTreeWriter};
use crate::array::{count_distinct_n, merge_arrays_n};

/// Merge two single-word trees (sets of keys) into a tree at `offset`.
///
/// Returns the number of words the new tree occupies.
pub fn merge1(
    left: &BTreeReader<'_>,
    right: &BTreeReader<'_>,
    writer: &mut BTreeWriter<'_>,
    offset: usize,
) -> Result<usize, BTreeError> {
    merge(left, right, writer, 1, offset, |a, _| a)
}

/// Merge two key/value trees into a tree at `offset`.
///
/// When a key is present in both trees, the new entry's value is
/// `combine(left_value, right_value)`.
///
/// Returns the number of words the new tree occupies.
pub fn merge2<F>(
    left: &BTreeReader<'_>,
    right: &BTreeReader<'_>,
    writer: &mut BTreeWriter<'_>,
    combine: F,
    offset: usize,
) -> Result<usize, BTreeError>
where
    F: FnMut(u64, u64) -> u64,
{
    merge(left, right, writer, 2, offset, combine)
}

fn merge<F>(
    left: &BTreeReader<'_>,
    right: &BTreeReader<'_>,
    writer: &mut BTreeWriter<'_>,
    entry_size: usize,
    offset: usize,
    combine: F,
) -> Result<usize, BTreeError>
where
    F: FnMut(u64, u64) -> u64,
{
    for actual in [
        left.context().entry_size(),
        right.context().entry_size(),
        writer.context().entry_size(),
    ] {
        if actual != entry_size {
            return Err(BTreeError::EntrySizeMismatch {
                expected: entry_size,
                actual,
            });
        }
    }

    let (left_data, right_data) = (left.data(), right.data());
    let num_entries = count_distinct_n(left_data, right_data, entry_size);

    tracing::trace!(
        left = left.num_entries(),
        right = right.num_entries(),
        merged = num_entries,
        "merging btrees"
    );

    writer.write(offset, num_entries, |out| {
        let written = merge_arrays_n(out, left_data, right_data, entry_size, combine);
        debug_assert_eq!(written, out.len());
        Ok(())
    })
}
