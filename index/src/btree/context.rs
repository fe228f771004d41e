//! Tree shape parameters and layout arithmetic.
//!
//! # Design
//!
//! A [`BTreeContext`] fixes three things for every tree written or read with
//! it: the page size (a power of two, [`BTreeBlockSize`]), the entry size in
//! words, and the maximum number of index layers. Everything else about a
//! tree's layout follows from these and the entry count, so writers and
//! readers that share a context agree on where each layer lives.
//!
//! For `n` entries and page size `p`:
//!
//! - data pages: `ceil(n / p)`
//! - layer 0 has one slot per data page, rounded up to whole pages
//! - layer `l` has one slot per page of layer `l - 1`, rounded up likewise
//! - layers are added until one page covers everything below it
//!
//! A tree with `n <= p` entries needs no index at all.

/// Page size of a tree, as a power of two between 4 and 4096.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BTreeBlockSize {
    bits: u32,
}

impl BTreeBlockSize {
    pub const BS_4: Self = Self { bits: 2 };
    pub const BS_8: Self = Self { bits: 3 };
    pub const BS_16: Self = Self { bits: 4 };
    pub const BS_32: Self = Self { bits: 5 };
    pub const BS_64: Self = Self { bits: 6 };
    pub const BS_128: Self = Self { bits: 7 };
    pub const BS_256: Self = Self { bits: 8 };
    pub const BS_512: Self = Self { bits: 9 };
    pub const BS_1024: Self = Self { bits: 10 };
    pub const BS_2048: Self = Self { bits: 11 };
    pub const BS_4096: Self = Self { bits: 12 };

    const MIN_BITS: u32 = 2;
    const MAX_BITS: u32 = 12;

    /// Block size for `2^bits` entries per page, if within range.
    #[must_use]
    pub const fn from_bit_count(bits: u32) -> Option<Self> {
        if bits >= Self::MIN_BITS && bits <= Self::MAX_BITS {
            Some(Self { bits })
        } else {
            None
        }
    }

    /// Block size for `page_size` entries per page, if it is a power of two
    /// within range.
    #[must_use]
    pub const fn from_page_size(page_size: usize) -> Option<Self> {
        if page_size.is_power_of_two() {
            Self::from_bit_count(page_size.trailing_zeros())
        } else {
            None
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.bits
    }

    /// Entries per data page, and slots per index page.
    #[must_use]
    pub const fn page_size(self) -> usize {
        1 << self.bits
    }
}

/// Immutable parameters shared by a tree's writer and its readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeContext {
    max_layers: usize,
    entry_size: usize,
    block_size: BTreeBlockSize,
}

impl BTreeContext {
    /// Create a context.
    ///
    /// # Panics
    ///
    /// Panics if `entry_size` or `max_layers` is zero.
    #[must_use]
    pub const fn new(max_layers: usize, entry_size: usize, block_size: BTreeBlockSize) -> Self {
        assert!(entry_size >= 1, "entry size must be at least one word");
        assert!(max_layers >= 1, "a tree must allow at least one index layer");
        Self {
            max_layers,
            entry_size,
            block_size,
        }
    }

    #[must_use]
    pub const fn max_layers(&self) -> usize {
        self.max_layers
    }

    #[must_use]
    pub const fn entry_size(&self) -> usize {
        self.entry_size
    }

    #[must_use]
    pub const fn block_size(&self) -> BTreeBlockSize {
        self.block_size
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.block_size.page_size()
    }

    /// Number of index layers a tree of `num_entries` entries needs.
    ///
    /// This is not capped at [`max_layers`](Self::max_layers); the writer
    /// rejects trees that exceed it.
    #[must_use]
    pub const fn num_index_layers(&self, num_entries: usize) -> usize {
        let p = self.page_size();
        if num_entries <= p {
            return 0;
        }

        // Entries reachable from a single top page with `layers` layers
        let mut layers = 1;
        let mut reach = p.saturating_mul(p);
        while reach < num_entries {
            layers += 1;
            reach = reach.saturating_mul(p);
        }
        layers
    }

    /// Size in words of index layer `layer` (0 is closest to the data).
    ///
    /// Always a multiple of the page size.
    #[must_use]
    pub const fn index_layer_size(&self, num_entries: usize, layer: usize) -> usize {
        let p = self.page_size();
        let mut pages_below = num_entries.div_ceil(p);
        let mut size = 0;
        let mut l = 0;
        while l <= layer {
            size = pages_below.next_multiple_of(p);
            pages_below = size / p;
            l += 1;
        }
        size
    }

    /// Number of slots in index layer `layer` that refer to real pages below.
    ///
    /// Slots past this count are padding.
    #[must_use]
    pub const fn index_layer_slots(&self, num_entries: usize, layer: usize) -> usize {
        let p = self.page_size();
        let mut slots = num_entries.div_ceil(p);
        let mut l = 0;
        while l < layer {
            slots = slots.div_ceil(p);
            l += 1;
        }
        slots
    }

    /// Total size in words of all index layers.
    #[must_use]
    pub const fn index_size(&self, num_entries: usize) -> usize {
        let layers = self.num_index_layers(num_entries);
        let mut total = 0;
        let mut layer = 0;
        while layer < layers {
            total += self.index_layer_size(num_entries, layer);
            layer += 1;
        }
        total
    }

    /// Upper bound on the words a tree of `num_entries` entries occupies.
    ///
    /// Includes the header, worst-case alignment padding, the index and the
    /// data. A writer always returns this value, so trees can be packed back
    /// to back by advancing the write offset by it.
    #[must_use]
    pub const fn calculate_size(&self, num_entries: usize) -> usize {
        let padding = if self.num_index_layers(num_entries) > 0 {
            self.page_size()
        } else {
            0
        };
        super::HEADER_SIZE_WORDS
            + padding
            + self.index_size(num_entries)
            + num_entries * self.entry_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_constants() {
        assert_eq!(BTreeBlockSize::BS_4.page_size(), 4);
        assert_eq!(BTreeBlockSize::BS_128.page_size(), 128);
        assert_eq!(BTreeBlockSize::BS_4096.page_size(), 4096);
        assert_eq!(BTreeBlockSize::BS_64.bits(), 6);
    }

    #[test]
    fn test_block_size_from_page_size() {
        assert_eq!(BTreeBlockSize::from_page_size(16), Some(BTreeBlockSize::BS_16));
        assert_eq!(BTreeBlockSize::from_page_size(2), None);
        assert_eq!(BTreeBlockSize::from_page_size(24), None);
        assert_eq!(BTreeBlockSize::from_page_size(8192), None);
        assert_eq!(BTreeBlockSize::from_bit_count(12), Some(BTreeBlockSize::BS_4096));
        assert_eq!(BTreeBlockSize::from_bit_count(1), None);
    }

    #[test]
    fn test_num_index_layers() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);

        assert_eq!(ctx.num_index_layers(0), 0);
        assert_eq!(ctx.num_index_layers(4), 0);
        assert_eq!(ctx.num_index_layers(5), 1);
        assert_eq!(ctx.num_index_layers(9), 1);
        assert_eq!(ctx.num_index_layers(16), 1);
        assert_eq!(ctx.num_index_layers(17), 2);
        assert_eq!(ctx.num_index_layers(64), 2);
        assert_eq!(ctx.num_index_layers(65), 3);
    }

    #[test]
    fn test_top_layer_is_one_page() {
        for block_size in [BTreeBlockSize::BS_4, BTreeBlockSize::BS_8, BTreeBlockSize::BS_64] {
            let ctx = BTreeContext::new(8, 2, block_size);
            for n in [5, 17, 100, 1000, 4097, 100_000] {
                let layers = ctx.num_index_layers(n);
                if layers == 0 {
                    continue;
                }
                assert_eq!(ctx.index_layer_size(n, layers - 1), ctx.page_size(), "n = {n}");
                assert!(ctx.index_layer_slots(n, layers - 1) <= ctx.page_size());
                if layers > 1 {
                    assert!(ctx.index_layer_slots(n, layers - 2) > 1);
                }
            }
        }
    }

    #[test]
    fn test_layer_sizes() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);

        // 100 entries: 25 data pages, layer 0 holds 25 slots in 7 pages,
        // layer 1 holds 7 slots in 2 pages, layer 2 holds 2 slots in 1 page
        assert_eq!(ctx.num_index_layers(100), 3);
        assert_eq!(ctx.index_layer_slots(100, 0), 25);
        assert_eq!(ctx.index_layer_size(100, 0), 28);
        assert_eq!(ctx.index_layer_slots(100, 1), 7);
        assert_eq!(ctx.index_layer_size(100, 1), 8);
        assert_eq!(ctx.index_layer_slots(100, 2), 2);
        assert_eq!(ctx.index_layer_size(100, 2), 4);
        assert_eq!(ctx.index_size(100), 40);
    }

    #[test]
    fn test_calculate_size() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);
        assert_eq!(ctx.calculate_size(0), 3);
        assert_eq!(ctx.calculate_size(3), 6);
        assert_eq!(ctx.calculate_size(9), 3 + 4 + 4 + 9);

        let ctx = BTreeContext::new(5, 2, BTreeBlockSize::BS_4);
        assert_eq!(ctx.calculate_size(4), 3 + 8);
        assert_eq!(ctx.calculate_size(100), 3 + 4 + 40 + 200);
    }

    #[test]
    #[should_panic(expected = "entry size")]
    fn test_zero_entry_size_panics() {
        let _ = BTreeContext::new(5, 0, BTreeBlockSize::BS_4);
    }
}
