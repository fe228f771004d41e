//! Sequential writing of tree files.

use std::path::{Path, PathBuf};

use super::IndexError;
use super::header::{FILE_HEADER_WORDS, IndexFileHeader};
use crate::array::LongArray;
use crate::btree::{BTreeContext, BTreeError, BTreeHeader, BTreeWriter};

/// Appends trees one after another to a new file.
///
/// The file is created with room for a header and `capacity` words of trees.
/// [`finish`](Self::finish) truncates it to the words actually used and
/// writes the header.
pub(super) struct TreeFileWriter {
    path: PathBuf,
    array: LongArray,
    ctx: BTreeContext,
    cursor: usize,
}

impl TreeFileWriter {
    pub(super) fn create(
        path: &Path,
        ctx: BTreeContext,
        capacity: usize,
    ) -> Result<Self, IndexError> {
        let array = LongArray::create(path, FILE_HEADER_WORDS + capacity)?;

        Ok(Self {
            path: path.to_path_buf(),
            array,
            ctx,
            cursor: FILE_HEADER_WORDS,
        })
    }

    /// Append one tree.
    ///
    /// `write` receives a writer over the whole file and the offset to write
    /// at, and returns the tree's size. Returns the offset of the new tree.
    pub(super) fn append<F>(&mut self, write: F) -> Result<usize, IndexError>
    where
        F: FnOnce(&mut BTreeWriter<'_>, usize) -> Result<usize, BTreeError>,
    {
        let offset = self.cursor;
        let mut writer = BTreeWriter::new(self.array.words_mut()?, self.ctx);
        self.cursor += write(&mut writer, offset)?;
        Ok(offset)
    }

    /// Append a copy of an existing tree's data as a new tree.
    pub(super) fn append_copy(&mut self, num_entries: usize, data: &[u64]) -> Result<usize, IndexError> {
        self.append(|writer, offset| {
            writer.write(offset, num_entries, |out| {
                out.copy_from_slice(data);
                Ok(())
            })
        })
    }

    /// Number of entries in the tree already written at `offset`.
    pub(super) fn tree_entries(&self, offset: usize) -> Result<usize, IndexError> {
        Ok(BTreeHeader::read(self.array.words(), offset, &self.ctx)?.num_entries())
    }

    /// Seal the file and return its final size in words.
    pub(super) fn finish(self) -> Result<usize, IndexError> {
        let payload_words = self.cursor - FILE_HEADER_WORDS;
        let mut array = self.array.truncate(self.cursor)?;

        IndexFileHeader::new(&self.ctx, payload_words).write(array.words_mut()?);
        array.flush()?;

        tracing::debug!(
            path = %self.path.display(),
            words = self.cursor,
            "sealed index file"
        );

        Ok(self.cursor)
    }
}

/// Write a words file holding one tree of `(word, docs offset)` pairs.
///
/// `entries` is the flattened pairs, sorted by word.
pub(super) fn write_words_file(
    path: &Path,
    ctx: BTreeContext,
    entries: &[u64],
) -> Result<(), IndexError> {
    let num_words = entries.len() / ctx.entry_size();
    let mut file = TreeFileWriter::create(path, ctx, ctx.calculate_size(num_words))?;
    file.append_copy(num_words, entries)?;
    file.finish()?;
    Ok(())
}

pub(super) fn create_output_dir(dir: &Path) -> Result<(), IndexError> {
    if dir.exists() {
        return Err(IndexError::AlreadyExists(dir.to_path_buf()));
    }
    std::fs::create_dir_all(dir).map_err(|source| IndexError::Io {
        path: dir.to_path_buf(),
        source,
    })
}
