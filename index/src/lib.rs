// Layers, bottom up:
// 1. Word arrays: heap or memory-mapped `[u64]`, plus the search, filter and
//    merge primitives that run over them
// 2. B-trees: a static, implicit-layout tree over sorted fixed-width entries.
//    Written once in a single pass, then only read or merged
// 3. Reverse index: a words tree pointing into a file of per-word documents
//    trees
//
// Queries narrow a `LongQueryBuffer` of candidate documents by retaining or
// rejecting against one documents tree at a time.

pub mod array;
pub mod btree;
pub mod config;
pub mod reverse;
