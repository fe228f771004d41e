//! Flat word arrays and the algorithms that run over them.
//!
//! Every on-disk structure in this crate is a sequence of fixed-width 64-bit
//! words. This module provides:
//!
//! - [`LongArray`]: an owned word array, either on the heap or memory-mapped
//!   from a file, viewed as `[u64]`
//! - search primitives over word slices ([`binary_search_n`],
//!   [`binary_search_upper_bound`], [`first_unsorted_n`])
//! - the retain/reject scans used by query filtering ([`retain_n`], [`reject_n`])
//! - sorted two-array operations used by tree merging ([`count_distinct_n`],
//!   [`merge_arrays_n`])
//! - [`LongQueryBuffer`], the two-cursor candidate buffer
//!
//! # Strides
//!
//! Most functions take a `stride` (the entry size in words). Entries are
//! `stride` consecutive words and are ordered by their first word only; the
//! remaining words ride along.
//!
//! # Usage
//!
//! ```
//! use index::array::{LongQueryBuffer, binary_search_n, retain_n};
//!
//! // key/value pairs, sorted by key
//! let data = [1u64, 10, 5, 50, 9, 90];
//!
//! assert_eq!(binary_search_n(&data, 2, 5, 0, data.len()), Ok(2));
//! assert_eq!(binary_search_n(&data, 2, 6, 0, data.len()), Err(4));
//!
//! let mut buffer = LongQueryBuffer::new(vec![1, 2, 9]);
//! retain_n(&mut buffer, &data, 2, u64::MAX, 0, data.len());
//! buffer.finalize_filtering();
//! assert_eq!(buffer.as_slice(), &[1, 9]);
//! ```

mod file;
mod query_buffer;
mod search;
mod two_array;

pub use file::{ArrayError, LongArray, WORD_SIZE};
pub use query_buffer::LongQueryBuffer;
pub use search::{binary_search_n, binary_search_upper_bound, first_unsorted_n, reject_n, retain_n};
pub use two_array::{count_distinct_n, merge_arrays_n};
