//! Sentinel for detecting write callbacks that fill too little data.
//!
//! Before the write callback runs, a fixed three-word pattern is placed in
//! the last three words of the data region. A callback that writes every
//! entry overwrites it; one that stops short leaves it intact. Trees with
//! three or fewer entries are too small to mark and always pass.
//!
//! Data whose last three words equal the pattern is indistinguishable from
//! an under-write and is reported as one. With entry size 2 this happens
//! for sorted entries ending in `(.., 4), (5, 1)`.

const PATTERN: [u64; 3] = [4, 5, 1];

/// A marker on the tail of a tree's data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeDogEar {
    position: Option<usize>,
}

impl BTreeDogEar {
    /// Place the marker at the end of `data`, a data region holding
    /// `num_entries` entries.
    pub fn install(data: &mut [u64], num_entries: usize) -> Self {
        if num_entries <= PATTERN.len() || data.len() < PATTERN.len() {
            return Self { position: None };
        }

        let position = data.len() - PATTERN.len();
        data[position..].copy_from_slice(&PATTERN);
        Self {
            position: Some(position),
        }
    }

    /// Whether a marker was placed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.position.is_some()
    }

    /// Whether the marked words were overwritten.
    ///
    /// Always true for an inactive marker.
    #[must_use]
    pub fn verify(&self, data: &[u64]) -> bool {
        self.position.is_none_or(|position| {
            data[position..position + PATTERN.len()] != PATTERN
        })
    }
}
