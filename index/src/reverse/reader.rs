//! Querying a reverse index.

// Offsets stored in the words tree are word offsets within a mapped file.
#![allow(clippy::cast_possible_truncation)]

use std::path::Path;

use super::header::{FILE_HEADER_WORDS, HeaderError, IndexFileHeader};
use super::{DOCS_FILE_NAME, IndexError, IndexStats, WORDS_FILE_NAME};
use crate::array::{LongArray, LongQueryBuffer};
use crate::btree::{BTreeContext, BTreeReader};
use crate::config::IndexConfig;

/// A memory-mapped reverse index.
#[derive(Debug)]
pub struct ReverseIndexReader {
    words: LongArray,
    docs: LongArray,
    words_ctx: BTreeContext,
    docs_ctx: BTreeContext,
    num_words: usize,
}

impl ReverseIndexReader {
    /// Open the index in `dir`.
    ///
    /// Both file headers are validated and must match `config`.
    pub fn open(dir: &Path, config: &IndexConfig) -> Result<Self, IndexError> {
        let words_ctx = config.words_context();
        let docs_ctx = config.docs_context();

        let words = open_file(&dir.join(WORDS_FILE_NAME), &words_ctx)?;
        let docs = open_file(&dir.join(DOCS_FILE_NAME), &docs_ctx)?;

        let num_words = BTreeReader::new(words.words(), words_ctx, FILE_HEADER_WORDS)?.num_entries();

        tracing::debug!(
            dir = %dir.display(),
            num_words,
            docs_words = docs.len(),
            "opened reverse index"
        );

        Ok(Self {
            words,
            docs,
            words_ctx,
            docs_ctx,
            num_words,
        })
    }

    /// Number of distinct words in the index.
    #[must_use]
    pub const fn num_words(&self) -> usize {
        self.num_words
    }

    /// The words tree.
    pub fn words_tree(&self) -> Result<BTreeReader<'_>, IndexError> {
        Ok(BTreeReader::new(self.words.words(), self.words_ctx, FILE_HEADER_WORDS)?)
    }

    /// The documents tree at word offset `offset` of the documents file.
    pub(super) fn docs_tree(&self, offset: u64) -> Result<BTreeReader<'_>, IndexError> {
        Ok(BTreeReader::new(self.docs.words(), self.docs_ctx, offset as usize)?)
    }

    /// The documents tree of `word`, if the word is indexed.
    pub fn documents(&self, word: u64) -> Result<Option<BTreeReader<'_>>, IndexError> {
        let words_tree = self.words_tree()?;
        match words_tree.find_entry(word) {
            Some(position) => Ok(Some(self.docs_tree(words_tree.data()[position + 1])?)),
            None => Ok(None),
        }
    }

    /// Number of documents containing `word`.
    pub fn num_documents(&self, word: u64) -> Result<usize, IndexError> {
        Ok(self
            .documents(word)?
            .map_or(0, |tree| tree.num_entries()))
    }

    /// Keep only the candidates that contain `word`.
    ///
    /// If the word is not indexed, every candidate is rejected.
    pub fn retain_documents(
        &self,
        word: u64,
        buffer: &mut LongQueryBuffer,
    ) -> Result<(), IndexError> {
        match self.documents(word)? {
            Some(tree) => tree.retain_entries(buffer),
            None => buffer.reject_all(),
        }
        Ok(())
    }

    /// Drop the candidates that contain `word`.
    ///
    /// If the word is not indexed, every candidate is kept.
    pub fn reject_documents(
        &self,
        word: u64,
        buffer: &mut LongQueryBuffer,
    ) -> Result<(), IndexError> {
        match self.documents(word)? {
            Some(tree) => tree.reject_entries(buffer),
            None => buffer.retain_all(),
        }
        Ok(())
    }

    /// Metadata bits of `word` in each of `docs`.
    ///
    /// `docs` must be sorted. Documents that do not contain the word, and all
    /// documents when entries carry no metadata, yield 0.
    pub fn metadata(&self, word: u64, docs: &[u64]) -> Result<Vec<u64>, IndexError> {
        if self.docs_ctx.entry_size() < 2 {
            return Ok(vec![0; docs.len()]);
        }

        Ok(match self.documents(word)? {
            Some(tree) => tree.query_data(docs, 1),
            None => vec![0; docs.len()],
        })
    }

    /// Count words and postings.
    pub fn stats(&self) -> Result<IndexStats, IndexError> {
        let words_tree = self.words_tree()?;

        let mut postings = 0;
        for entry in words_tree.data().chunks_exact(IndexConfig::WORDS_ENTRY_SIZE) {
            postings += self.docs_tree(entry[1])?.num_entries();
        }

        Ok(IndexStats {
            words: words_tree.num_entries(),
            postings,
            docs_file_words: self.docs.len(),
        })
    }
}

fn open_file(path: &Path, ctx: &BTreeContext) -> Result<LongArray, IndexError> {
    let array = LongArray::open_read(path)?;

    let header = IndexFileHeader::read(array.words()).map_err(|source| IndexError::Header {
        path: path.to_path_buf(),
        source,
    })?;
    let required = FILE_HEADER_WORDS.saturating_add(header.payload_words);
    if required > array.len() {
        return Err(IndexError::Header {
            path: path.to_path_buf(),
            source: HeaderError::Truncated {
                required,
                available: array.len(),
            },
        });
    }
    if !header.matches(ctx) {
        return Err(IndexError::FormatMismatch(path.to_path_buf()));
    }

    Ok(array)
}
