//! In-place filtering buffer for sorted candidate ids.
//!
//! # Design
//!
//! The buffer holds a sorted list of values and two cursors. A filtering pass
//! walks the read cursor forward; values that should survive are copied down
//! to the write cursor, values that should not are skipped. Filtering happens
//! in place without allocating.
//!
//! ```text
//!   retained          pending
//! [ 1  9  . . 13 17 20 ]
//!         ^     ^       ^
//!       write  read    end
//! ```
//!
//! Several filters can run in sequence, each ending with
//! [`LongQueryBuffer::finalize_filtering`], which makes the retained prefix
//! the new contents.
//!
//! # Invariants
//!
//! - `write <= read <= end <= data.len()`
//! - `data[..write]` holds the values retained so far, in their original order

/// A buffer of candidate values being narrowed down by filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongQueryBuffer {
    data: Vec<u64>,
    read: usize,
    write: usize,
    end: usize,
}

impl LongQueryBuffer {
    /// Create a buffer over `values`, which should be sorted ascending.
    #[must_use]
    pub fn new(values: Vec<u64>) -> Self {
        let end = values.len();
        Self {
            data: values,
            read: 0,
            write: 0,
            end,
        }
    }

    /// Create a buffer from a slice of values.
    #[must_use]
    pub fn from_slice(values: &[u64]) -> Self {
        Self::new(values.to_vec())
    }

    /// Whether there are unread values left in this pass.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.read < self.end
    }

    /// The value under the read cursor.
    ///
    /// # Panics
    ///
    /// Panics if called when [`has_more`](Self::has_more) is false.
    #[must_use]
    pub fn current_value(&self) -> u64 {
        assert!(self.has_more(), "read cursor is past the end of the buffer");
        self.data[self.read]
    }

    /// Keep the current value and move to the next one.
    ///
    /// Returns whether more values remain.
    pub fn retain_and_advance(&mut self) -> bool {
        self.data[self.write] = self.data[self.read];
        self.write += 1;
        self.read += 1;
        self.has_more()
    }

    /// Drop the current value and move to the next one.
    ///
    /// Returns whether more values remain.
    pub const fn reject_and_advance(&mut self) -> bool {
        self.read += 1;
        self.has_more()
    }

    /// Keep every remaining value.
    pub fn retain_all(&mut self) {
        if self.write != self.read {
            self.data.copy_within(self.read..self.end, self.write);
        }
        self.write += self.end - self.read;
        self.read = self.end;
    }

    /// Drop every remaining value.
    pub const fn reject_all(&mut self) {
        self.read = self.end;
    }

    /// End the current pass.
    ///
    /// Values that were neither retained nor rejected are dropped. The
    /// retained values become the buffer's contents and both cursors return
    /// to the start, ready for another pass.
    pub const fn finalize_filtering(&mut self) {
        self.end = self.write;
        self.read = 0;
        self.write = 0;
    }

    /// Number of values in the buffer.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.end
    }

    /// Whether the buffer holds no values.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == 0
    }

    /// The buffer's values.
    ///
    /// Only meaningful between passes, after
    /// [`finalize_filtering`](Self::finalize_filtering).
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.data[..self.end]
    }

    /// Copy out the buffer's values.
    #[must_use]
    pub fn copy_data(&self) -> Vec<u64> {
        self.as_slice().to_vec()
    }

    /// Replace the contents with `values` and reset both cursors.
    pub fn reset(&mut self, values: &[u64]) {
        self.data.clear();
        self.data.extend_from_slice(values);
        self.end = values.len();
        self.read = 0;
        self.write = 0;
    }

    /// Empty the buffer, keeping its allocation.
    pub fn zero(&mut self) {
        self.data.clear();
        self.end = 0;
        self.read = 0;
        self.write = 0;
    }
}
