//! Consolidating two indexes into one.
//!
//! # Design
//!
//! The merge walks the two words trees in key order. A word present in only
//! one index has its documents tree copied; a word present in both has its
//! two documents trees merged, with metadata OR-ed for shared documents.
//!
//! The output documents file is created with room for the worst case (no
//! shared documents) and truncated once the last tree is written.
//!
//! # Pre-conditions
//!
//! - Both inputs were written with `config`

use std::path::Path;

use super::files::{TreeFileWriter, create_output_dir, write_words_file};
use super::{DOCS_FILE_NAME, IndexError, IndexStats, ReverseIndexReader, WORDS_FILE_NAME};
use crate::btree::{merge1, merge2};
use crate::config::IndexConfig;

/// Merge the indexes in `left` and `right` into a new index in `output`.
///
/// Fails if `output` already exists.
pub fn merge_indexes(
    left: &Path,
    right: &Path,
    output: &Path,
    config: &IndexConfig,
) -> Result<IndexStats, IndexError> {
    if output.exists() {
        return Err(IndexError::AlreadyExists(output.to_path_buf()));
    }

    let left_index = ReverseIndexReader::open(left, config)?;
    let right_index = ReverseIndexReader::open(right, config)?;
    let left_words = left_index.words_tree()?;
    let right_words = right_index.words_tree()?;

    let docs_ctx = config.docs_context();

    let mut num_words = 0;
    let mut capacity = 0;
    for (_, source) in WordUnion::new(left_words.data(), right_words.data()) {
        let left_count = match source.left() {
            Some(offset) => left_index.docs_tree(offset)?.num_entries(),
            None => 0,
        };
        let right_count = match source.right() {
            Some(offset) => right_index.docs_tree(offset)?.num_entries(),
            None => 0,
        };
        capacity += docs_ctx.calculate_size(left_count + right_count);
        num_words += 1;
    }

    create_output_dir(output)?;
    let mut docs_file = TreeFileWriter::create(&output.join(DOCS_FILE_NAME), docs_ctx, capacity)?;

    let mut words = Vec::with_capacity(num_words * IndexConfig::WORDS_ENTRY_SIZE);
    let mut postings = 0;
    let mut shared = 0;

    for (word, source) in WordUnion::new(left_words.data(), right_words.data()) {
        let offset = match source {
            WordSource::Left(offset) => {
                let tree = left_index.docs_tree(offset)?;
                postings += tree.num_entries();
                docs_file.append_copy(tree.num_entries(), tree.data())?
            }
            WordSource::Right(offset) => {
                let tree = right_index.docs_tree(offset)?;
                postings += tree.num_entries();
                docs_file.append_copy(tree.num_entries(), tree.data())?
            }
            WordSource::Both(left_offset, right_offset) => {
                let left_tree = left_index.docs_tree(left_offset)?;
                let right_tree = right_index.docs_tree(right_offset)?;
                shared += 1;

                let offset = docs_file.append(|writer, offset| {
                    if docs_ctx.entry_size() == 1 {
                        merge1(&left_tree, &right_tree, writer, offset)
                    } else {
                        merge2(&left_tree, &right_tree, writer, |a, b| a | b, offset)
                    }
                })?;
                postings += docs_file.tree_entries(offset)?;
                offset
            }
        };

        words.extend([word, offset as u64]);
    }

    let docs_file_words = docs_file.finish()?;
    write_words_file(&output.join(WORDS_FILE_NAME), config.words_context(), &words)?;

    let stats = IndexStats {
        words: num_words,
        postings,
        docs_file_words,
    };

    tracing::info!(
        left = %left.display(),
        right = %right.display(),
        output = %output.display(),
        words = stats.words,
        shared_words = shared,
        postings = stats.postings,
        estimated_words = capacity,
        docs_file_words = stats.docs_file_words,
        "merged reverse indexes"
    );

    Ok(stats)
}

/// Where a word's documents tree comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordSource {
    Left(u64),
    Right(u64),
    Both(u64, u64),
}

impl WordSource {
    const fn left(self) -> Option<u64> {
        match self {
            Self::Left(offset) | Self::Both(offset, _) => Some(offset),
            Self::Right(_) => None,
        }
    }

    const fn right(self) -> Option<u64> {
        match self {
            Self::Right(offset) | Self::Both(_, offset) => Some(offset),
            Self::Left(_) => None,
        }
    }
}

/// Walks two words trees' data in word order.
struct WordUnion<'a> {
    left: &'a [u64],
    right: &'a [u64],
}

impl<'a> WordUnion<'a> {
    const fn new(left: &'a [u64], right: &'a [u64]) -> Self {
        Self { left, right }
    }
}

impl Iterator for WordUnion<'_> {
    type Item = (u64, WordSource);

    fn next(&mut self) -> Option<Self::Item> {
        const E: usize = IndexConfig::WORDS_ENTRY_SIZE;

        let item = match (self.left.first_chunk::<E>(), self.right.first_chunk::<E>()) {
            (None, None) => return None,
            (Some(&[word, offset]), None) => {
                self.left = &self.left[E..];
                (word, WordSource::Left(offset))
            }
            (None, Some(&[word, offset])) => {
                self.right = &self.right[E..];
                (word, WordSource::Right(offset))
            }
            (Some(&[left_word, left_offset]), Some(&[right_word, right_offset])) => {
                if left_word < right_word {
                    self.left = &self.left[E..];
                    (left_word, WordSource::Left(left_offset))
                } else if right_word < left_word {
                    self.right = &self.right[E..];
                    (right_word, WordSource::Right(right_offset))
                } else {
                    self.left = &self.left[E..];
                    self.right = &self.right[E..];
                    (left_word, WordSource::Both(left_offset, right_offset))
                }
            }
        };

        Some(item)
    }
}
