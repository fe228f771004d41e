//! Static, sorted B-trees laid out in flat word arrays.
//!
//! A tree is written once into a word array and then read in place, typically
//! from a memory-mapped file. It maps sorted 64-bit keys to fixed-size entries
//! and supports point lookups, batched filtering of candidate ids and batched
//! value retrieval.
//!
//! # Layout
//!
//! ```text
//! offset
//!   |
//!   v
//! +--------+---------+-------------+-----+-------------+------------------+
//! | header | padding | index layer | ... | index layer | data entries     |
//! | 3 words|         | (top, root) |     | (layer 0)   | n * entry_size   |
//! +--------+---------+-------------+-----+-------------+------------------+
//!                    ^                                 ^
//!               index_offset                      data_offset
//! ```
//!
//! Data entries are `entry_size` words each, sorted by their first word (the
//! key). Entries are grouped into pages of `page_size` entries. Index layer 0
//! holds one slot per data page: the key of the last entry in that page. Each
//! layer above holds one slot per page of the layer below, again the last key
//! of that page. The top layer is exactly one page. Unused slots hold
//! `u64::MAX`.
//!
//! Trees with at most `page_size` entries have no index layers; the data is
//! searched directly.
//!
//! # Components
//!
//! - [`BTreeContext`]: immutable shape parameters and size arithmetic
//! - [`BTreeHeader`]: the three-word header and layout offsets
//! - [`BTreeWriter`]: writes a tree and builds its index
//! - [`BTreeReader`]: lookups and filtering over a written tree
//! - [`merge1`], [`merge2`]: merge two trees into a new one
//! - [`BTreeDogEar`]: sentinel used to detect under-written data

mod context;
mod dog_ear;
mod header;
mod merger;
mod reader;
mod writer;

pub use context::{BTreeBlockSize, BTreeContext};
pub use dog_ear::BTreeDogEar;
pub use header::{BTreeHeader, HEADER_SIZE_WORDS, make_header};
pub use merger::{merge1, merge2};
pub use reader::BTreeReader;
pub use writer::BTreeWriter;

/// Errors from writing, reading or merging trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BTreeError {
    /// The write callback left the end of the data region untouched.
    UnderWrite { num_entries: usize },
    /// Data entries are not sorted by key.
    Unsorted { position: usize },
    /// The word array is too short for the tree it claims to hold.
    Truncated { required: usize, available: usize },
    /// The header does not describe a tree of the expected shape.
    MalformedHeader { offset: usize },
    /// A tree has a different entry size than the operation requires.
    EntrySizeMismatch { expected: usize, actual: usize },
    /// More entries than the header can record.
    TooManyEntries(usize),
    /// The tree would need more index layers than the context allows.
    TooManyLayers { required: usize, max: usize },
    /// The destination array is too small for the tree being written.
    OutOfBounds { required: usize, available: usize },
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnderWrite { num_entries } => {
                write!(f, "write callback did not fill all {num_entries} entries")
            }
            Self::Unsorted { position } => {
                write!(f, "data entries are not sorted at entry {position}")
            }
            Self::Truncated {
                required,
                available,
            } => write!(
                f,
                "tree needs {required} words but only {available} are available"
            ),
            Self::MalformedHeader { offset } => {
                write!(f, "malformed tree header at word {offset}")
            }
            Self::EntrySizeMismatch { expected, actual } => {
                write!(f, "expected entry size {expected}, found {actual}")
            }
            Self::TooManyEntries(n) => write!(f, "{n} entries exceed the header limit"),
            Self::TooManyLayers { required, max } => {
                write!(f, "tree needs {required} index layers, limit is {max}")
            }
            Self::OutOfBounds {
                required,
                available,
            } => write!(
                f,
                "tree ends at word {required} but the destination holds {available}"
            ),
        }
    }
}

impl std::error::Error for BTreeError {}
