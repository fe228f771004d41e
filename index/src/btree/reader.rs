//! Lookups and batched filtering over a written tree.
//!
//! # Design
//!
//! A lookup descends from the root page to a data page. At each layer the
//! pointer picks the first slot whose key is `>=` the search key; that slot's
//! key (the boundary) is the largest key in the subtree below. Once at a data
//! page, the page is binary searched.
//!
//! Batched operations take sorted keys and exploit the boundary: every key up
//! to the boundary of the current data page can be resolved by a forward scan
//! of that page, without descending again. A descent is only repeated when
//! the next key exceeds the boundary.
//!
//! # Invariants
//!
//! - The pointer only descends for keys `<=` the tree's largest key, so every
//!   slot it lands on refers to a real page.
//!
//! Positions returned by this module are word offsets relative to the start
//! of the data region ([`BTreeReader::data`]).

use std::ops::Range;

use super::{BTreeContext, BTreeError, BTreeHeader};
use crate::array::{LongQueryBuffer, binary_search_n, binary_search_upper_bound, reject_n, retain_n};

type Scan = fn(&mut LongQueryBuffer, &[u64], usize, u64, usize, usize);

/// Read-only view of a tree inside a word array.
///
/// Opening a reader only decodes the header; it allocates nothing.
#[derive(Debug, Clone, Copy)]
pub struct BTreeReader<'a> {
    index: &'a [u64],
    data: &'a [u64],
    ctx: BTreeContext,
    header: BTreeHeader,
}

impl<'a> BTreeReader<'a> {
    /// Open the tree whose header is at `offset` in `words`.
    pub fn new(words: &'a [u64], ctx: BTreeContext, offset: usize) -> Result<Self, BTreeError> {
        let header = BTreeHeader::read(words, offset, &ctx)?;

        Ok(Self {
            index: &words[header.index_offset()..header.data_offset()],
            data: &words[header.data_offset()..header.data_end(&ctx)],
            ctx,
            header,
        })
    }

    #[must_use]
    pub const fn header(&self) -> &BTreeHeader {
        &self.header
    }

    #[must_use]
    pub const fn context(&self) -> &BTreeContext {
        &self.ctx
    }

    #[must_use]
    pub const fn num_entries(&self) -> usize {
        self.header.num_entries()
    }

    /// The data region: `num_entries * entry_size` words.
    #[must_use]
    pub const fn data(&self) -> &'a [u64] {
        self.data
    }

    /// Largest key in the tree.
    #[must_use]
    pub fn max_key(&self) -> Option<u64> {
        self.data.chunks_exact(self.ctx.entry_size()).last().map(|e| e[0])
    }

    /// Position of an entry with key `key`, if present.
    #[must_use]
    pub fn find_entry(&self, key: u64) -> Option<usize> {
        if !self.may_contain(key) {
            return None;
        }

        let mut pointer = BTreePointer::new(self);
        pointer.walk_to_data(key);
        let (from, to) = pointer.data_range();
        binary_search_n(self.data, self.ctx.entry_size(), key, from, to).ok()
    }

    /// Position of the first entry with key `>= key`, or the data length.
    #[must_use]
    pub fn lower_bound(&self, key: u64) -> usize {
        if !self.may_contain(key) {
            return self.data.len();
        }

        let mut pointer = BTreePointer::new(self);
        pointer.walk_to_data(key);
        let (from, to) = pointer.data_range();
        match binary_search_n(self.data, self.ctx.entry_size(), key, from, to) {
            Ok(position) | Err(position) => position,
        }
    }

    /// Positions of the entries with keys in `[start, next)`.
    #[must_use]
    pub fn range_for_prefix(&self, start: u64, next: u64) -> Range<usize> {
        let from = self.lower_bound(start);
        let to = self.lower_bound(next).max(from);
        from..to
    }

    /// Keep only the buffer values that are keys in this tree.
    ///
    /// The buffer must be sorted. Call
    /// [`LongQueryBuffer::finalize_filtering`] afterwards to commit.
    pub fn retain_entries(&self, buffer: &mut LongQueryBuffer) {
        self.filter(buffer, retain_n, LongQueryBuffer::reject_all);
    }

    /// Drop the buffer values that are keys in this tree.
    ///
    /// The buffer must be sorted. Call
    /// [`LongQueryBuffer::finalize_filtering`] afterwards to commit.
    pub fn reject_entries(&self, buffer: &mut LongQueryBuffer) {
        self.filter(buffer, reject_n, LongQueryBuffer::retain_all);
    }

    fn filter(&self, buffer: &mut LongQueryBuffer, scan: Scan, past_end: fn(&mut LongQueryBuffer)) {
        let Some(max_key) = self.max_key() else {
            past_end(buffer);
            return;
        };

        let e = self.ctx.entry_size();
        let mut pointer = BTreePointer::new(self);

        while buffer.has_more() {
            let key = buffer.current_value();
            if key > max_key {
                past_end(buffer);
                return;
            }

            pointer.reset_to_root();
            pointer.walk_to_data(key);
            let (from, to) = pointer.data_range();
            let start = match binary_search_n(self.data, e, key, from, to) {
                Ok(position) | Err(position) => position,
            };

            scan(buffer, self.data, e, pointer.boundary, start, to);
        }
    }

    /// Fetch word `relative_offset` of the entry for each key.
    ///
    /// `keys` must be sorted. Keys that are absent yield 0.
    ///
    /// # Panics
    ///
    /// Panics if `relative_offset` is not less than the entry size.
    #[must_use]
    pub fn query_data(&self, keys: &[u64], relative_offset: usize) -> Vec<u64> {
        let e = self.ctx.entry_size();
        assert!(
            relative_offset < e,
            "offset {relative_offset} is outside a {e}-word entry"
        );
        debug_assert!(keys.is_sorted(), "query keys must be sorted");

        let mut values = vec![0; keys.len()];
        let Some(max_key) = self.max_key() else {
            return values;
        };

        let mut pointer = BTreePointer::new(self);
        let mut i = 0;

        while i < keys.len() && keys[i] <= max_key {
            pointer.reset_to_root();
            pointer.walk_to_data(keys[i]);
            let (from, to) = pointer.data_range();
            let mut position = match binary_search_n(self.data, e, keys[i], from, to) {
                Ok(position) | Err(position) => position,
            };

            while i < keys.len() && keys[i] <= pointer.boundary && position < to {
                let key = self.data[position];
                if keys[i] < key {
                    i += 1;
                } else if keys[i] == key {
                    values[i] = self.data[position + relative_offset];
                    i += 1;
                } else {
                    position += e;
                }
            }
        }

        values
    }

    const fn may_contain(&self, key: u64) -> bool {
        match self.data.len() {
            0 => false,
            len => key <= self.data[len - self.ctx.entry_size()],
        }
    }
}

/// Cursor descending from the root toward a data page.
struct BTreePointer<'r, 'a> {
    reader: &'r BTreeReader<'a>,
    /// Index layers remaining above the current position; 0 at the data.
    layer: usize,
    /// Slot offset within the current layer, or entry index at the data.
    offset: usize,
    /// Start of the next layer down, relative to the index region.
    layer_start: usize,
    /// Largest key reachable from the current position.
    boundary: u64,
}

impl<'r, 'a> BTreePointer<'r, 'a> {
    const fn new(reader: &'r BTreeReader<'a>) -> Self {
        Self {
            reader,
            layer: reader.header.layers(),
            offset: 0,
            layer_start: 0,
            boundary: u64::MAX,
        }
    }

    const fn reset_to_root(&mut self) {
        self.layer = self.reader.header.layers();
        self.offset = 0;
        self.layer_start = 0;
        self.boundary = u64::MAX;
    }

    fn walk_to_data(&mut self, key: u64) {
        while self.layer > 0 {
            self.walk_toward_child(key);
        }
    }

    fn walk_toward_child(&mut self, key: u64) {
        let p = self.reader.ctx.page_size();
        self.layer -= 1;

        // Layers are stored top first, so the next one down follows this one
        let page_start = self.layer_start + self.offset;
        self.layer_start += self
            .reader
            .ctx
            .index_layer_size(self.reader.header.num_entries(), self.layer);

        let slot = binary_search_upper_bound(self.reader.index, key, page_start, page_start + p);
        debug_assert!(slot < page_start + p, "key {key} is beyond its page");

        self.boundary = self.reader.index[slot];
        self.offset = p * (self.offset + slot - page_start);
    }

    /// Word range of the data page the pointer rests on.
    fn data_range(&self) -> (usize, usize) {
        let e = self.reader.ctx.entry_size();
        let n = self.reader.header.num_entries();

        if self.reader.header.layers() == 0 {
            (0, n * e)
        } else {
            let last = (self.offset + self.reader.ctx.page_size()).min(n);
            (self.offset * e, last * e)
        }
    }
}
