//! File header shared by the words and documents files.
//!
//! The header occupies the first four words of each file; trees start right
//! after it.
//!
//! ```text
//! word 0: magic "REVINDEX"
//! word 1: descriptor: format version (bits 32..64) | entry size (bits 8..32)
//!         | block size bits (bits 0..8)
//! word 2: payload length in words, excluding the header
//! word 3: CRC32 of words 0..3
//! ```

// Entry sizes and block bits are small; the descriptor fields fit their widths.
#![allow(clippy::cast_possible_truncation)]

use crate::btree::{BTreeBlockSize, BTreeContext};

/// Magic number identifying a reverse index file: "REVINDEX"
pub const MAGIC: [u8; 8] = *b"REVINDEX";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the file header in words.
pub const FILE_HEADER_WORDS: usize = 4;

/// File header word offsets.
mod offsets {
    pub const MAGIC: usize = 0;
    pub const DESCRIPTOR: usize = 1;
    pub const PAYLOAD_WORDS: usize = 2;
    pub const CHECKSUM: usize = 3;
}

const ENTRY_SIZE_MASK: u64 = 0xFF_FFFF;
const BLOCK_BITS_MASK: u64 = 0xFF;

/// Decoded file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFileHeader {
    /// Format version number.
    pub format_version: u32,
    /// Entry size of the trees in the file.
    pub entry_size: usize,
    /// Page size of the trees in the file.
    pub block_size: BTreeBlockSize,
    /// Words in use after the header.
    pub payload_words: usize,
}

impl IndexFileHeader {
    /// Header for a file of trees written with `ctx`.
    #[must_use]
    pub const fn new(ctx: &BTreeContext, payload_words: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            entry_size: ctx.entry_size(),
            block_size: ctx.block_size(),
            payload_words,
        }
    }

    /// Whether trees in this file can be read with `ctx`.
    #[must_use]
    pub fn matches(&self, ctx: &BTreeContext) -> bool {
        self.entry_size == ctx.entry_size() && self.block_size == ctx.block_size()
    }

    /// Encode into the first [`FILE_HEADER_WORDS`] words of `words`.
    pub fn write(&self, words: &mut [u64]) {
        words[offsets::MAGIC] = u64::from_le_bytes(MAGIC);
        words[offsets::DESCRIPTOR] = (u64::from(self.format_version) << 32)
            | ((self.entry_size as u64 & ENTRY_SIZE_MASK) << 8)
            | u64::from(self.block_size.bits());
        words[offsets::PAYLOAD_WORDS] = self.payload_words as u64;
        words[offsets::CHECKSUM] = u64::from(compute_checksum(words));
    }

    /// Decode and validate the header at the start of `words`.
    pub fn read(words: &[u64]) -> Result<Self, HeaderError> {
        if words.len() < FILE_HEADER_WORDS {
            return Err(HeaderError::Truncated {
                required: FILE_HEADER_WORDS,
                available: words.len(),
            });
        }

        let magic = words[offsets::MAGIC].to_le_bytes();
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagic(magic));
        }

        let stored = words[offsets::CHECKSUM] as u32;
        let computed = compute_checksum(words);
        if stored != computed {
            return Err(HeaderError::ChecksumMismatch { stored, computed });
        }

        let descriptor = words[offsets::DESCRIPTOR];
        let format_version = (descriptor >> 32) as u32;
        if format_version != FORMAT_VERSION {
            return Err(HeaderError::UnsupportedVersion(format_version));
        }

        let bits = (descriptor & BLOCK_BITS_MASK) as u32;
        let block_size =
            BTreeBlockSize::from_bit_count(bits).ok_or(HeaderError::InvalidBlockSize(bits))?;

        Ok(Self {
            format_version,
            entry_size: ((descriptor >> 8) & ENTRY_SIZE_MASK) as usize,
            block_size,
            payload_words: words[offsets::PAYLOAD_WORDS] as usize,
        })
    }
}

fn compute_checksum(words: &[u64]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for word in &words[..offsets::CHECKSUM] {
        hasher.update(&word.to_le_bytes());
    }
    hasher.finalize()
}

/// Errors from validating a file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// File is shorter than its header says.
    Truncated { required: usize, available: usize },
    /// Invalid magic number.
    InvalidMagic([u8; 8]),
    /// Header words do not match their checksum.
    ChecksumMismatch { stored: u32, computed: u32 },
    /// Unsupported format version.
    UnsupportedVersion(u32),
    /// Block size bits out of range.
    InvalidBlockSize(u32),
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated {
                required,
                available,
            } => write!(f, "file holds {available} words but needs {required}"),
            Self::InvalidMagic(magic) => {
                write!(
                    f,
                    "invalid magic number: {:?}",
                    String::from_utf8_lossy(magic)
                )
            }
            Self::ChecksumMismatch { stored, computed } => write!(
                f,
                "header checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
            ),
            Self::UnsupportedVersion(v) => write!(f, "unsupported format version: {v}"),
            Self::InvalidBlockSize(bits) => write!(f, "invalid block size: 2^{bits}"),
        }
    }
}

impl std::error::Error for HeaderError {}
