//! Reverse index files built from B-trees.
//!
//! A reverse index maps each word id to the sorted set of documents that
//! contain it. It lives in a directory of two files:
//!
//! - `words.dat`: one tree with entry size 2, mapping a word id to the word
//!   offset of that word's documents tree in `docs.dat`
//! - `docs.dat`: one documents tree per word, packed back to back. Entries are
//!   bare document ids (entry size 1) or document id plus metadata bits
//!   (entry size 2), as configured
//!
//! Both files start with an [`IndexFileHeader`].
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use index::array::LongQueryBuffer;
//! use index::config::IndexConfig;
//! use index::reverse::{ReverseIndexBuilder, ReverseIndexReader};
//!
//! let config = IndexConfig::default();
//! let mut builder = ReverseIndexBuilder::new(config);
//! builder.add(7, 100, 0b01);
//! builder.add(7, 250, 0b10);
//! builder.finish(Path::new("/tmp/index"))?;
//!
//! let index = ReverseIndexReader::open(Path::new("/tmp/index"), &config)?;
//! let mut candidates = LongQueryBuffer::new(vec![100, 200, 250]);
//! index.retain_documents(7, &mut candidates)?;
//! candidates.finalize_filtering();
//! assert_eq!(candidates.as_slice(), &[100, 250]);
//! # Ok::<(), index::reverse::IndexError>(())
//! ```

mod builder;
mod files;
mod header;
mod merge;
mod reader;

use std::path::PathBuf;

use crate::array::ArrayError;
use crate::btree::BTreeError;

pub use builder::ReverseIndexBuilder;
pub use header::{FILE_HEADER_WORDS, FORMAT_VERSION, HeaderError, IndexFileHeader, MAGIC};
pub use merge::merge_indexes;
pub use reader::ReverseIndexReader;

/// File name of the words tree.
pub const WORDS_FILE_NAME: &str = "words.dat";
/// File name of the documents trees.
pub const DOCS_FILE_NAME: &str = "docs.dat";

/// Summary of a written or opened index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of distinct words.
    pub words: usize,
    /// Number of (word, document) postings.
    pub postings: usize,
    /// Size of the documents file in words, including its header.
    pub docs_file_words: usize,
}

/// Errors from building, opening, querying or merging an index.
#[derive(Debug)]
pub enum IndexError {
    /// I/O error on an index directory.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Word array error.
    Array(ArrayError),
    /// Tree error.
    BTree(BTreeError),
    /// Invalid file header.
    Header { path: PathBuf, source: HeaderError },
    /// File was written with a different entry size or block size.
    FormatMismatch(PathBuf),
    /// Output already exists.
    AlreadyExists(PathBuf),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on {}: {source}", path.display()),
            Self::Array(e) => write!(f, "array error: {e}"),
            Self::BTree(e) => write!(f, "btree error: {e}"),
            Self::Header { path, source } => {
                write!(f, "invalid header in {}: {source}", path.display())
            }
            Self::FormatMismatch(path) => write!(
                f,
                "{} was written with a different entry size or block size",
                path.display()
            ),
            Self::AlreadyExists(path) => write!(f, "{} already exists", path.display()),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Array(e) => Some(e),
            Self::BTree(e) => Some(e),
            Self::Header { source, .. } => Some(source),
            Self::FormatMismatch(_) | Self::AlreadyExists(_) => None,
        }
    }
}

impl From<ArrayError> for IndexError {
    fn from(e: ArrayError) -> Self {
        Self::Array(e)
    }
}

impl From<BTreeError> for IndexError {
    fn from(e: BTreeError) -> Self {
        Self::BTree(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::LongQueryBuffer;
    use crate::btree::BTreeBlockSize;
    use crate::config::IndexConfig;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    type Postings = BTreeMap<u64, BTreeMap<u64, u64>>;

    /// Small pages so that documents trees get several index layers.
    fn small_config(docs_entry_size: usize) -> IndexConfig {
        IndexConfig {
            words_block_size: BTreeBlockSize::BS_4,
            docs_block_size: BTreeBlockSize::BS_8,
            docs_entry_size,
            max_layers: 8,
        }
    }

    fn random_postings(rng: &mut StdRng, words: u64, docs: u64, count: usize) -> Postings {
        let mut postings = Postings::new();
        for _ in 0..count {
            let word = rng.random_range(0..words) * 3;
            let doc = rng.random_range(0..docs);
            let meta = 1u64 << rng.random_range(0..64u32);
            *postings.entry(word).or_default().entry(doc).or_insert(0) |= meta;
        }
        postings
    }

    fn build(dir: &Path, config: IndexConfig, postings: &Postings) -> IndexStats {
        let mut builder = ReverseIndexBuilder::new(config);
        for (&word, docs) in postings {
            for (&doc, &meta) in docs {
                builder.add(word, doc, meta);
            }
        }
        builder.finish(dir).expect("build index")
    }

    fn create_test_index(config: IndexConfig, postings: &Postings) -> (TempDir, PathBuf) {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("index");
        build(&path, config, postings);
        (dir, path)
    }

    fn assert_index_matches(index: &ReverseIndexReader, postings: &Postings, with_metadata: bool) {
        assert_eq!(index.num_words(), postings.len());

        for (&word, docs) in postings {
            let ids: Vec<u64> = docs.keys().copied().collect();
            assert_eq!(index.num_documents(word).expect("count"), ids.len());

            let tree = index.documents(word).expect("lookup").expect("word present");
            for &doc in &ids {
                assert!(tree.find_entry(doc).is_some(), "word {word} doc {doc}");
            }

            if with_metadata {
                let expected: Vec<u64> = docs.values().copied().collect();
                assert_eq!(index.metadata(word, &ids).expect("metadata"), expected);
            }
        }
    }

    #[test]
    fn test_build_and_query() {
        let mut rng = StdRng::seed_from_u64(1);
        let postings = random_postings(&mut rng, 50, 5000, 4000);
        let (_dir, path) = create_test_index(small_config(2), &postings);

        let index = ReverseIndexReader::open(&path, &small_config(2)).expect("open");
        assert_index_matches(&index, &postings, true);

        // Words are multiples of three, so these are absent
        assert!(index.documents(1).expect("lookup").is_none());
        assert_eq!(index.num_documents(4).expect("count"), 0);
    }

    #[test]
    fn test_retain_and_reject_documents() {
        let mut rng = StdRng::seed_from_u64(2);
        let postings = random_postings(&mut rng, 10, 1000, 2000);
        let (_dir, path) = create_test_index(small_config(1), &postings);
        let index = ReverseIndexReader::open(&path, &small_config(1)).expect("open");

        let candidates: Vec<u64> = (0..1000).step_by(3).collect();
        for (&word, docs) in &postings {
            let mut buffer = LongQueryBuffer::from_slice(&candidates);
            index.retain_documents(word, &mut buffer).expect("retain");
            buffer.finalize_filtering();
            let expected: Vec<u64> =
                candidates.iter().copied().filter(|c| docs.contains_key(c)).collect();
            assert_eq!(buffer.copy_data(), expected);

            let mut buffer = LongQueryBuffer::from_slice(&candidates);
            index.reject_documents(word, &mut buffer).expect("reject");
            buffer.finalize_filtering();
            let expected: Vec<u64> =
                candidates.iter().copied().filter(|c| !docs.contains_key(c)).collect();
            assert_eq!(buffer.copy_data(), expected);
        }
    }

    #[test]
    fn test_absent_word_filters() {
        let postings = Postings::from([(3, BTreeMap::from([(10, 0), (20, 0)]))]);
        let (_dir, path) = create_test_index(small_config(2), &postings);
        let index = ReverseIndexReader::open(&path, &small_config(2)).expect("open");

        let mut buffer = LongQueryBuffer::from_slice(&[10, 20, 30]);
        index.retain_documents(99, &mut buffer).expect("retain");
        buffer.finalize_filtering();
        assert!(buffer.is_empty());

        let mut buffer = LongQueryBuffer::from_slice(&[10, 20, 30]);
        index.reject_documents(99, &mut buffer).expect("reject");
        buffer.finalize_filtering();
        assert_eq!(buffer.as_slice(), &[10, 20, 30]);
    }

    #[test]
    fn test_duplicate_postings_combine_metadata() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("index");

        let mut builder = ReverseIndexBuilder::new(small_config(2));
        builder.add(5, 42, 0b001);
        builder.add(5, 42, 0b100);
        builder.add(5, 7, 0b010);
        assert_eq!(builder.num_words(), 1);
        let stats = builder.finish(&path).expect("build");
        assert_eq!(stats.words, 1);
        assert_eq!(stats.postings, 2);

        let index = ReverseIndexReader::open(&path, &small_config(2)).expect("open");
        assert_eq!(index.metadata(5, &[7, 42, 43]).expect("metadata"), vec![0b010, 0b101, 0]);
    }

    #[test]
    fn test_metadata_without_metadata_words() {
        let postings = Postings::from([(3, BTreeMap::from([(10, 0b11)]))]);
        let (_dir, path) = create_test_index(small_config(1), &postings);
        let index = ReverseIndexReader::open(&path, &small_config(1)).expect("open");

        assert_eq!(index.metadata(3, &[10]).expect("metadata"), vec![0]);
    }

    #[test]
    fn test_empty_index() {
        let (_dir, path) = create_test_index(small_config(2), &Postings::new());
        let index = ReverseIndexReader::open(&path, &small_config(2)).expect("open");

        assert_eq!(index.num_words(), 0);
        assert!(index.documents(0).expect("lookup").is_none());
        let stats = index.stats().expect("stats");
        assert_eq!(stats.words, 0);
        assert_eq!(stats.postings, 0);
        assert_eq!(stats.docs_file_words, FILE_HEADER_WORDS);
    }

    #[test]
    fn test_stats_match_build() {
        let mut rng = StdRng::seed_from_u64(3);
        let postings = random_postings(&mut rng, 30, 800, 1500);
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("index");
        let built = build(&path, small_config(2), &postings);

        let index = ReverseIndexReader::open(&path, &small_config(2)).expect("open");
        assert_eq!(index.stats().expect("stats"), built);
        assert_eq!(built.postings, postings.values().map(BTreeMap::len).sum::<usize>());
    }

    #[test]
    fn test_open_with_wrong_config() {
        let postings = Postings::from([(3, BTreeMap::from([(10, 0)]))]);
        let (_dir, path) = create_test_index(small_config(2), &postings);

        let result = ReverseIndexReader::open(&path, &small_config(1));
        assert!(matches!(result, Err(IndexError::FormatMismatch(_))));
    }

    #[test]
    fn test_open_corrupted_header() {
        let postings = Postings::from([(3, BTreeMap::from([(10, 0)]))]);
        let (_dir, path) = create_test_index(small_config(2), &postings);

        let words_path = path.join(WORDS_FILE_NAME);
        let mut bytes = std::fs::read(&words_path).expect("read");
        bytes[16] ^= 0xFF;
        std::fs::write(&words_path, bytes).expect("write");

        let result = ReverseIndexReader::open(&path, &small_config(2));
        assert!(matches!(
            result,
            Err(IndexError::Header {
                source: HeaderError::ChecksumMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_build_refuses_existing_directory() {
        let dir = tempdir().expect("create temp dir");
        let builder = ReverseIndexBuilder::new(small_config(2));

        let result = builder.finish(dir.path());
        assert!(matches!(result, Err(IndexError::AlreadyExists(_))));
    }

    #[test]
    fn test_merge_indexes() {
        for entry_size in [1, 2] {
            let config = small_config(entry_size);
            let mut rng = StdRng::seed_from_u64(10 + entry_size as u64);
            let left = random_postings(&mut rng, 40, 3000, 3000);
            let right = random_postings(&mut rng, 40, 3000, 3000);

            let dir = tempdir().expect("create temp dir");
            let left_path = dir.path().join("left");
            let right_path = dir.path().join("right");
            let output_path = dir.path().join("merged");
            build(&left_path, config, &left);
            build(&right_path, config, &right);

            let stats =
                merge_indexes(&left_path, &right_path, &output_path, &config).expect("merge");

            let mut expected = left.clone();
            for (&word, docs) in &right {
                let merged = expected.entry(word).or_default();
                for (&doc, &meta) in docs {
                    *merged.entry(doc).or_insert(0) |= meta;
                }
            }

            let shared: BTreeSet<u64> = left.keys().filter(|w| right.contains_key(w)).copied().collect();
            assert!(!shared.is_empty());
            assert_eq!(stats.words, expected.len());

            let index = ReverseIndexReader::open(&output_path, &config).expect("open merged");
            assert_index_matches(&index, &expected, entry_size == 2);
            assert_eq!(index.stats().expect("stats"), stats);

            // Estimated space beyond the last tree is released
            let file_len = std::fs::metadata(output_path.join(DOCS_FILE_NAME))
                .expect("metadata")
                .len();
            assert_eq!(file_len, (stats.docs_file_words * crate::array::WORD_SIZE) as u64);
        }
    }

    #[test]
    fn test_merge_with_disjoint_words() {
        let config = small_config(2);
        let left = Postings::from([(3, BTreeMap::from([(1, 1), (2, 2)]))]);
        let right = Postings::from([(6, BTreeMap::from([(5, 4)]))]);

        let dir = tempdir().expect("create temp dir");
        let output_path = dir.path().join("merged");
        build(&dir.path().join("left"), config, &left);
        build(&dir.path().join("right"), config, &right);

        merge_indexes(
            &dir.path().join("left"),
            &dir.path().join("right"),
            &output_path,
            &config,
        )
        .expect("merge");

        let index = ReverseIndexReader::open(&output_path, &config).expect("open merged");
        assert_eq!(index.num_words(), 2);
        assert_eq!(index.metadata(3, &[1, 2]).expect("metadata"), vec![1, 2]);
        assert_eq!(index.metadata(6, &[5]).expect("metadata"), vec![4]);
    }

    #[test]
    fn test_merge_refuses_existing_output() {
        let config = small_config(2);
        let postings = Postings::from([(3, BTreeMap::from([(1, 1)]))]);
        let dir = tempdir().expect("create temp dir");
        build(&dir.path().join("a"), config, &postings);
        build(&dir.path().join("b"), config, &postings);

        let result = merge_indexes(
            &dir.path().join("a"),
            &dir.path().join("b"),
            &dir.path().join("a"),
            &config,
        );
        assert!(matches!(result, Err(IndexError::AlreadyExists(_))));
    }
}
