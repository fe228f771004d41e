//! Writes trees into word arrays.
//!
//! # Design
//!
//! The caller fills the data region through a callback; the writer owns
//! everything else. A write proceeds in four steps:
//!
//! 1. Compute and store the header
//! 2. Hand the data region to the callback
//! 3. Verify the data (debug builds and the `verify-writes` feature only)
//! 4. Build the index layers bottom-up from the data
//!
//! # Pre-conditions
//!
//! - The callback writes exactly `num_entries` entries, sorted by key
//!
//! # Post-conditions
//!
//! - The header at `offset` describes the tree
//! - Every index slot holds the last key of the page it refers to, or
//!   `u64::MAX` if it refers to no page

use super::dog_ear::BTreeDogEar;
use super::header::make_header;
use super::{BTreeContext, BTreeError, BTreeHeader};
use crate::array::first_unsorted_n;

/// Whether written data is checked for under-writes and ordering.
const VERIFY_WRITES: bool = cfg!(any(debug_assertions, feature = "verify-writes"));

/// Writes trees into a borrowed word array.
pub struct BTreeWriter<'a> {
    words: &'a mut [u64],
    ctx: BTreeContext,
}

impl<'a> BTreeWriter<'a> {
    pub const fn new(words: &'a mut [u64], ctx: BTreeContext) -> Self {
        Self { words, ctx }
    }

    #[must_use]
    pub const fn context(&self) -> &BTreeContext {
        &self.ctx
    }

    /// Header that a tree of `num_entries` entries at `offset` would have.
    #[must_use]
    pub const fn make_header(&self, offset: usize, num_entries: usize) -> BTreeHeader {
        make_header(&self.ctx, offset, num_entries)
    }

    /// Write a tree of `num_entries` entries at `offset`.
    ///
    /// `write_entries` receives the data region, exactly
    /// `num_entries * entry_size` words, and must fill it with entries sorted
    /// by key. Returns [`BTreeContext::calculate_size`] for `num_entries`, the
    /// distance to the next free offset.
    ///
    /// With verification enabled, data ending in the dog-ear pattern
    /// `4, 5, 1` is rejected as [`BTreeError::UnderWrite`] even when it was
    /// written in full.
    pub fn write<F>(
        &mut self,
        offset: usize,
        num_entries: usize,
        write_entries: F,
    ) -> Result<usize, BTreeError>
    where
        F: FnOnce(&mut [u64]) -> Result<(), BTreeError>,
    {
        if u32::try_from(num_entries).is_err() {
            return Err(BTreeError::TooManyEntries(num_entries));
        }

        let header = self.make_header(offset, num_entries);
        if header.layers() > self.ctx.max_layers() {
            return Err(BTreeError::TooManyLayers {
                required: header.layers(),
                max: self.ctx.max_layers(),
            });
        }

        let data_end = header.data_end(&self.ctx);
        if data_end > self.words.len() {
            return Err(BTreeError::OutOfBounds {
                required: data_end,
                available: self.words.len(),
            });
        }

        header.write(self.words, offset);

        let data = &mut self.words[header.data_offset()..data_end];
        let dog_ear = if VERIFY_WRITES {
            Some(BTreeDogEar::install(data, num_entries))
        } else {
            None
        };

        write_entries(data)?;

        let data = &self.words[header.data_offset()..data_end];
        if let Some(dog_ear) = dog_ear {
            if !dog_ear.verify(data) {
                return Err(BTreeError::UnderWrite { num_entries });
            }
            if let Some(position) = first_unsorted_n(data, self.ctx.entry_size()) {
                return Err(BTreeError::Unsorted { position });
            }
        }

        if header.layers() > 0 {
            self.write_index(&header);
        }

        tracing::trace!(
            offset,
            num_entries,
            layers = header.layers(),
            "wrote btree"
        );

        Ok(self.ctx.calculate_size(num_entries))
    }

    fn write_index(&mut self, header: &BTreeHeader) {
        let p = self.ctx.page_size();
        let e = self.ctx.entry_size();
        let n = header.num_entries();
        let layer_offsets = header.layer_offsets(&self.ctx);

        let region = &mut self.words[header.index_offset()..header.data_end(&self.ctx)];
        let (index, data) = region.split_at_mut(header.data_offset() - header.index_offset());

        // Layer 0: last key of each data page
        let base = layer_offsets[0];
        let slots = self.ctx.index_layer_slots(n, 0);
        for slot in 0..slots {
            let last_entry = ((slot + 1) * p).min(n) - 1;
            index[base + slot] = data[last_entry * e];
        }
        let size = self.ctx.index_layer_size(n, 0);
        index[base + slots..base + size].fill(u64::MAX);

        // Upper layers: last key of each page in the layer below
        for layer in 1..header.layers() {
            let below_base = layer_offsets[layer - 1];
            let below_slots = self.ctx.index_layer_slots(n, layer - 1);

            let base = layer_offsets[layer];
            let slots = self.ctx.index_layer_slots(n, layer);
            for slot in 0..slots {
                let last_child = ((slot + 1) * p).min(below_slots) - 1;
                index[base + slot] = index[below_base + last_child];
            }
            let size = self.ctx.index_layer_size(n, layer);
            index[base + slots..base + size].fill(u64::MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::BTreeBlockSize;

    fn fill_keys(keys: &[u64]) -> impl FnOnce(&mut [u64]) -> Result<(), BTreeError> + '_ {
        move |data: &mut [u64]| {
            data.copy_from_slice(keys);
            Ok(())
        }
    }

    #[test]
    fn test_write_small_tree() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);
        let mut words = vec![0; ctx.calculate_size(3)];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        let size = writer.write(0, 3, fill_keys(&[2, 4, 6])).expect("write");

        assert_eq!(size, 6);
        assert_eq!(words, vec![3, 3, 3, 2, 4, 6]);
    }

    #[test]
    fn test_write_single_layer_index() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);
        let keys = [1, 5, 9, 13, 17, 21, 25, 29, 33];
        let mut words = vec![0; ctx.calculate_size(keys.len())];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        writer.write(0, keys.len(), fill_keys(&keys)).expect("write");

        let header = BTreeHeader::read(&words, 0, &ctx).expect("header");
        assert_eq!(header.layers(), 1);
        assert_eq!(&words[4..8], &[13, 29, 33, u64::MAX]);
        assert_eq!(&words[8..17], &keys);
    }

    #[test]
    fn test_write_multi_layer_index() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);
        let keys: Vec<u64> = (1..=20).collect();
        let mut words = vec![0; ctx.calculate_size(keys.len())];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        writer.write(0, keys.len(), fill_keys(&keys)).expect("write");

        // 20 entries: 5 data pages, layer 0 has 8 slots, layer 1 has 4
        let header = BTreeHeader::read(&words, 0, &ctx).expect("header");
        assert_eq!(header.layers(), 2);
        let index = &words[header.index_offset()..header.data_offset()];
        assert_eq!(index.len(), 12);

        // Top layer first: last key under each layer 0 page
        assert_eq!(&index[..4], &[16, 20, u64::MAX, u64::MAX]);
        // Layer 0: last key of each data page
        assert_eq!(
            &index[4..],
            &[4, 8, 12, 16, 20, u64::MAX, u64::MAX, u64::MAX]
        );
    }

    #[test]
    fn test_write_with_values_indexes_keys_only() {
        let ctx = BTreeContext::new(5, 2, BTreeBlockSize::BS_4);
        let entries: Vec<u64> = (0..6).flat_map(|k| [k * 2, 1000 + k]).collect();
        let mut words = vec![0; ctx.calculate_size(6)];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        writer.write(0, 6, fill_keys(&entries)).expect("write");

        let header = BTreeHeader::read(&words, 0, &ctx).expect("header");
        let index = &words[header.index_offset()..header.data_offset()];
        assert_eq!(index, &[6, 10, u64::MAX, u64::MAX]);
    }

    #[test]
    fn test_trees_pack_back_to_back() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);
        let first: Vec<u64> = (0..10).collect();
        let second: Vec<u64> = (100..103).collect();
        let total = ctx.calculate_size(first.len()) + ctx.calculate_size(second.len());
        let mut words = vec![0; total];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        let size = writer.write(0, first.len(), fill_keys(&first)).expect("write first");
        writer
            .write(size, second.len(), fill_keys(&second))
            .expect("write second");

        let header = BTreeHeader::read(&words, size, &ctx).expect("second header");
        assert_eq!(header.num_entries(), 3);
        assert_eq!(&words[header.data_offset()..header.data_end(&ctx)], &[100, 101, 102]);
    }

    #[test]
    fn test_write_out_of_bounds() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);
        let mut words = vec![0; 10];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        let result = writer.write(0, 9, |_| Ok(()));
        assert_eq!(
            result,
            Err(BTreeError::OutOfBounds {
                required: 17,
                available: 10
            })
        );
    }

    #[test]
    fn test_write_too_many_layers() {
        let ctx = BTreeContext::new(1, 1, BTreeBlockSize::BS_4);
        let mut words = vec![0; 100];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        let result = writer.write(0, 17, |_| Ok(()));
        assert_eq!(result, Err(BTreeError::TooManyLayers { required: 2, max: 1 }));
    }

    #[test]
    fn test_callback_error_propagates() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);
        let mut words = vec![0; ctx.calculate_size(2)];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        let result = writer.write(0, 2, |_| Err(BTreeError::Unsorted { position: 7 }));
        assert_eq!(result, Err(BTreeError::Unsorted { position: 7 }));
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "verify-writes"))]
    fn test_under_write_detected() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);
        let mut words = vec![0; ctx.calculate_size(8)];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        let result = writer.write(0, 8, |data| {
            data[..5].copy_from_slice(&[1, 2, 3, 4, 5]);
            Ok(())
        });
        assert_eq!(result, Err(BTreeError::UnderWrite { num_entries: 8 }));
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "verify-writes"))]
    fn test_unsorted_data_detected() {
        let ctx = BTreeContext::new(5, 1, BTreeBlockSize::BS_4);
        let mut words = vec![0; ctx.calculate_size(6)];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        let result = writer.write(0, 6, fill_keys(&[1, 2, 8, 3, 9, 10]));
        assert_eq!(result, Err(BTreeError::Unsorted { position: 3 }));
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "verify-writes"))]
    fn test_data_ending_in_dog_ear_pattern_is_rejected() {
        let ctx = BTreeContext::new(5, 2, BTreeBlockSize::BS_4);
        let entries = [1, 0, 2, 0, 3, 4, 5, 1];
        let mut words = vec![0; ctx.calculate_size(4)];
        let mut writer = BTreeWriter::new(&mut words, ctx);

        let result = writer.write(0, 4, fill_keys(&entries));
        assert_eq!(result, Err(BTreeError::UnderWrite { num_entries: 4 }));

        // Any other final value passes
        let entries = [1, 0, 2, 0, 3, 4, 5, 2];
        let mut words = vec![0; ctx.calculate_size(4)];
        let mut writer = BTreeWriter::new(&mut words, ctx);
        assert_eq!(writer.write(0, 4, fill_keys(&entries)), Ok(ctx.calculate_size(4)));
    }
}
