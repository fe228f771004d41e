//! The three-word tree header.
//!
//! # Encoding
//!
//! ```text
//! word 0: layers (high 32 bits) | num_entries (low 32 bits)
//! word 1: index_offset (absolute word offset of the first index layer)
//! word 2: data_offset  (absolute word offset of the first data entry)
//! ```
//!
//! Offsets are absolute within the word array the tree lives in, not relative
//! to the header.

#![allow(clippy::cast_possible_truncation)]

use super::{BTreeContext, BTreeError};

/// Size of the header in words.
pub const HEADER_SIZE_WORDS: usize = 3;

const ENTRIES_MASK: u64 = 0xFFFF_FFFF;

/// Decoded tree header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeHeader {
    layers: usize,
    num_entries: usize,
    index_offset: usize,
    data_offset: usize,
}

/// Compute the header for a tree of `num_entries` entries written at `offset`.
///
/// When the tree has index layers, the index region is aligned so that it
/// starts on a multiple of the page size.
#[must_use]
pub const fn make_header(ctx: &BTreeContext, offset: usize, num_entries: usize) -> BTreeHeader {
    let layers = ctx.num_index_layers(num_entries);
    let padding = if layers > 0 {
        let p = ctx.page_size();
        (p - (offset + HEADER_SIZE_WORDS) % p) % p
    } else {
        0
    };

    let index_offset = offset + HEADER_SIZE_WORDS + padding;
    let data_offset = index_offset + ctx.index_size(num_entries);

    BTreeHeader {
        layers,
        num_entries,
        index_offset,
        data_offset,
    }
}

impl BTreeHeader {
    #[must_use]
    pub const fn layers(&self) -> usize {
        self.layers
    }

    #[must_use]
    pub const fn num_entries(&self) -> usize {
        self.num_entries
    }

    #[must_use]
    pub const fn index_offset(&self) -> usize {
        self.index_offset
    }

    #[must_use]
    pub const fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// Absolute word offset one past the last data word.
    #[must_use]
    pub const fn data_end(&self, ctx: &BTreeContext) -> usize {
        self.data_offset + self.num_entries * ctx.entry_size()
    }

    /// Encode as three words.
    #[must_use]
    pub const fn encode(&self) -> [u64; HEADER_SIZE_WORDS] {
        [
            ((self.layers as u64) << 32) | (self.num_entries as u64 & ENTRIES_MASK),
            self.index_offset as u64,
            self.data_offset as u64,
        ]
    }

    /// Decode from three words without validation.
    #[must_use]
    pub const fn decode(words: [u64; HEADER_SIZE_WORDS]) -> Self {
        Self {
            layers: (words[0] >> 32) as usize,
            num_entries: (words[0] & ENTRIES_MASK) as usize,
            index_offset: words[1] as usize,
            data_offset: words[2] as usize,
        }
    }

    /// Write the header at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `words` has fewer than three words at `offset`.
    pub fn write(&self, words: &mut [u64], offset: usize) {
        words[offset..offset + HEADER_SIZE_WORDS].copy_from_slice(&self.encode());
    }

    /// Read and validate the header at `offset`.
    ///
    /// The header must describe a tree with the layout `ctx` would produce
    /// for the same entry count, and the whole tree must fit in `words`.
    pub fn read(words: &[u64], offset: usize, ctx: &BTreeContext) -> Result<Self, BTreeError> {
        let header_end = offset.saturating_add(HEADER_SIZE_WORDS);
        if header_end > words.len() {
            return Err(BTreeError::Truncated {
                required: header_end,
                available: words.len(),
            });
        }

        let header = Self::decode([words[offset], words[offset + 1], words[offset + 2]]);

        let expected = make_header(ctx, offset, header.num_entries);
        if header != expected {
            return Err(BTreeError::MalformedHeader { offset });
        }

        let data_end = header.data_end(ctx);
        if data_end > words.len() {
            return Err(BTreeError::Truncated {
                required: data_end,
                available: words.len(),
            });
        }

        Ok(header)
    }

    /// Offset of each index layer, relative to `index_offset`.
    ///
    /// Indexed by layer number. The top layer is stored first, so it has
    /// offset 0, and layer 0 is stored last, right before the data.
    #[must_use]
    pub fn layer_offsets(&self, ctx: &BTreeContext) -> Vec<usize> {
        let mut offsets = vec![0; self.layers];
        let mut offset = 0;
        for layer in (0..self.layers).rev() {
            offsets[layer] = offset;
            offset += ctx.index_layer_size(self.num_entries, layer);
        }
        offsets
    }
}
