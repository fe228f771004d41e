//! Building a reverse index from postings.

use std::collections::BTreeMap;
use std::path::Path;

use super::files::{TreeFileWriter, create_output_dir, write_words_file};
use super::{DOCS_FILE_NAME, IndexError, IndexStats, WORDS_FILE_NAME};
use crate::config::IndexConfig;

/// Collects `(word, document, metadata)` postings and writes them as an index.
///
/// Postings may be added in any order. A document added twice for the same
/// word is stored once, with the metadata of both additions OR-ed together.
#[derive(Debug)]
pub struct ReverseIndexBuilder {
    config: IndexConfig,
    postings: BTreeMap<u64, Vec<(u64, u64)>>,
}

impl ReverseIndexBuilder {
    #[must_use]
    pub const fn new(config: IndexConfig) -> Self {
        Self {
            config,
            postings: BTreeMap::new(),
        }
    }

    /// Record that `doc` contains `word`.
    ///
    /// `metadata` is ignored when documents trees have entry size 1.
    pub fn add(&mut self, word: u64, doc: u64, metadata: u64) {
        self.postings.entry(word).or_default().push((doc, metadata));
    }

    /// Number of distinct words added so far.
    #[must_use]
    pub fn num_words(&self) -> usize {
        self.postings.len()
    }

    /// Write the index into the new directory `dir`.
    ///
    /// Fails if `dir` already exists.
    pub fn finish(mut self, dir: &Path) -> Result<IndexStats, IndexError> {
        create_output_dir(dir)?;

        let docs_ctx = self.config.docs_context();
        let entry_size = docs_ctx.entry_size();

        let mut combined = 0;
        for docs in self.postings.values_mut() {
            docs.sort_unstable_by_key(|&(doc, _)| doc);
            let before = docs.len();
            docs.dedup_by(|duplicate, kept| {
                if duplicate.0 == kept.0 {
                    kept.1 |= duplicate.1;
                    true
                } else {
                    false
                }
            });
            combined += before - docs.len();
        }
        if combined > 0 {
            tracing::warn!(combined, "combined duplicate postings");
        }

        let capacity = self
            .postings
            .values()
            .map(|docs| docs_ctx.calculate_size(docs.len()))
            .sum();
        let mut docs_file = TreeFileWriter::create(&dir.join(DOCS_FILE_NAME), docs_ctx, capacity)?;

        let mut words = Vec::with_capacity(self.postings.len() * IndexConfig::WORDS_ENTRY_SIZE);
        let mut postings = 0;

        for (&word, docs) in &self.postings {
            let offset = docs_file.append(|writer, offset| {
                writer.write(offset, docs.len(), |data| {
                    for (entry, &(doc, metadata)) in data.chunks_exact_mut(entry_size).zip(docs) {
                        entry[0] = doc;
                        if let Some(slot) = entry.get_mut(1) {
                            *slot = metadata;
                        }
                    }
                    Ok(())
                })
            })?;

            words.extend([word, offset as u64]);
            postings += docs.len();
        }

        let docs_file_words = docs_file.finish()?;
        write_words_file(&dir.join(WORDS_FILE_NAME), self.config.words_context(), &words)?;

        let stats = IndexStats {
            words: self.postings.len(),
            postings,
            docs_file_words,
        };

        tracing::info!(
            dir = %dir.display(),
            words = stats.words,
            postings = stats.postings,
            docs_file_words = stats.docs_file_words,
            "built reverse index"
        );

        Ok(stats)
    }
}
