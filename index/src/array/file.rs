//! Owned word arrays backed by the heap or by a memory-mapped file.
//!
//! File-backed arrays map the whole file and view it as native-endian `u64`
//! words. The byte-to-word view goes through `zerocopy`, so the only unsafe
//! operation is creating the map itself.
//!
//! # Invariants
//!
//! - A mapped file's length is always a multiple of [`WORD_SIZE`]
//! - Mapped memory is page aligned, so it is always aligned for `u64`

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut};
use zerocopy::FromBytes;

/// Size of one word in bytes.
pub const WORD_SIZE: usize = std::mem::size_of::<u64>();

/// An owned array of 64-bit words.
pub struct LongArray {
    storage: Storage,
}

enum Storage {
    Heap(Vec<u64>),
    ReadWrite {
        file: File,
        path: PathBuf,
        mmap: MmapMut,
    },
    ReadOnly {
        path: PathBuf,
        mmap: Mmap,
    },
}

impl LongArray {
    /// Allocate a zeroed heap array of `size` words.
    #[must_use]
    pub fn allocate(size: usize) -> Self {
        Self {
            storage: Storage::Heap(vec![0; size]),
        }
    }

    /// Wrap an existing vector of words.
    #[must_use]
    pub const fn from_vec(words: Vec<u64>) -> Self {
        Self {
            storage: Storage::Heap(words),
        }
    }

    /// Create a new zero-filled file of `size` words and map it for writing.
    ///
    /// An existing file at `path` is truncated.
    pub fn create(path: &Path, size: usize) -> Result<Self, ArrayError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| ArrayError::io(path, e))?;

        file.set_len(byte_len(size))
            .map_err(|e| ArrayError::io(path, e))?;

        let mmap = map_read_write(&file, path)?;

        Ok(Self {
            storage: Storage::ReadWrite {
                file,
                path: path.to_path_buf(),
                mmap,
            },
        })
    }

    /// Map an existing file for writing.
    pub fn open_write(path: &Path) -> Result<Self, ArrayError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ArrayError::io(path, e))?;
        check_file_length(&file, path)?;

        let mmap = map_read_write(&file, path)?;

        Ok(Self {
            storage: Storage::ReadWrite {
                file,
                path: path.to_path_buf(),
                mmap,
            },
        })
    }

    /// Map an existing file for reading.
    pub fn open_read(path: &Path) -> Result<Self, ArrayError> {
        let file = File::open(path).map_err(|e| ArrayError::io(path, e))?;
        check_file_length(&file, path)?;

        let mmap = map_read_only(&file, path)?;

        Ok(Self {
            storage: Storage::ReadOnly {
                path: path.to_path_buf(),
                mmap,
            },
        })
    }

    /// Number of words in the array.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words().len()
    }

    /// Whether the array holds no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View the array as words.
    #[must_use]
    pub fn words(&self) -> &[u64] {
        match &self.storage {
            Storage::Heap(words) => words,
            Storage::ReadWrite { mmap, .. } => bytes_as_words(mmap),
            Storage::ReadOnly { mmap, .. } => bytes_as_words(mmap),
        }
    }

    /// View the array as mutable words.
    ///
    /// Returns an error if the array was opened read-only.
    pub fn words_mut(&mut self) -> Result<&mut [u64], ArrayError> {
        match &mut self.storage {
            Storage::Heap(words) => Ok(words),
            Storage::ReadWrite { mmap, .. } => Ok(bytes_as_words_mut(mmap)),
            Storage::ReadOnly { path, .. } => Err(ArrayError::ReadOnly(path.clone())),
        }
    }

    /// Flush written words to the backing file.
    ///
    /// A no-op for heap and read-only arrays.
    pub fn flush(&self) -> Result<(), ArrayError> {
        match &self.storage {
            Storage::ReadWrite { path, mmap, .. } => {
                mmap.flush().map_err(|e| ArrayError::io(path, e))
            }
            Storage::Heap(_) | Storage::ReadOnly { .. } => Ok(()),
        }
    }

    /// Shrink the array to its first `size` words.
    ///
    /// File-backed arrays are flushed, unmapped, truncated on disk and mapped
    /// again, which is why this consumes the array.
    pub fn truncate(self, size: usize) -> Result<Self, ArrayError> {
        match self.storage {
            Storage::Heap(mut words) => {
                words.truncate(size);
                Ok(Self::from_vec(words))
            }
            Storage::ReadWrite { file, path, mmap } => {
                let current = mmap.len() / WORD_SIZE;
                if size > current {
                    return Err(ArrayError::OutOfBounds {
                        requested: size,
                        size: current,
                    });
                }

                mmap.flush().map_err(|e| ArrayError::io(&path, e))?;
                drop(mmap);

                file.set_len(byte_len(size))
                    .map_err(|e| ArrayError::io(&path, e))?;
                let mmap = map_read_write(&file, &path)?;

                Ok(Self {
                    storage: Storage::ReadWrite { file, path, mmap },
                })
            }
            Storage::ReadOnly { path, .. } => Err(ArrayError::ReadOnly(path)),
        }
    }
}

impl std::fmt::Debug for LongArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backing = match &self.storage {
            Storage::Heap(_) => "heap",
            Storage::ReadWrite { .. } => "mmap-rw",
            Storage::ReadOnly { .. } => "mmap-ro",
        };
        f.debug_struct("LongArray")
            .field("backing", &backing)
            .field("len", &self.len())
            .finish()
    }
}

const fn byte_len(words: usize) -> u64 {
    (words * WORD_SIZE) as u64
}

fn check_file_length(file: &File, path: &Path) -> Result<(), ArrayError> {
    let len = file.metadata().map_err(|e| ArrayError::io(path, e))?.len();
    if len % WORD_SIZE as u64 != 0 {
        return Err(ArrayError::Misaligned {
            path: path.to_path_buf(),
            len,
        });
    }
    Ok(())
}

// Length and alignment are checked when the map is created, and maps are
// page aligned, so the views below cannot fail.

fn bytes_as_words(bytes: &[u8]) -> &[u64] {
    let words = <[u64]>::ref_from_bytes(bytes);
    debug_assert!(words.is_ok(), "{} bytes are not aligned words", bytes.len());
    words.unwrap_or_default()
}

fn bytes_as_words_mut(bytes: &mut [u8]) -> &mut [u64] {
    let len = bytes.len();
    let words = <[u64]>::mut_from_bytes(bytes);
    debug_assert!(words.is_ok(), "{len} bytes are not aligned words");
    words.unwrap_or_default()
}

#[allow(unsafe_code)]
fn map_read_write(file: &File, path: &Path) -> Result<MmapMut, ArrayError> {
    // SAFETY: index files are written once by this process and never resized
    // while mapped; `truncate` drops the map before changing the length.
    unsafe { MmapMut::map_mut(file) }.map_err(|e| ArrayError::io(path, e))
}

#[allow(unsafe_code)]
fn map_read_only(file: &File, path: &Path) -> Result<Mmap, ArrayError> {
    // SAFETY: published index files are immutable; readers never observe a
    // file that is still being written.
    unsafe { Mmap::map(file) }.map_err(|e| ArrayError::io(path, e))
}

/// Errors from creating, mapping or resizing word arrays.
#[derive(Debug)]
pub enum ArrayError {
    /// I/O error on the backing file.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// File length is not a whole number of words.
    Misaligned { path: PathBuf, len: u64 },
    /// Attempted to write to a read-only mapping.
    ReadOnly(PathBuf),
    /// Requested size exceeds the array.
    OutOfBounds { requested: usize, size: usize },
}

impl ArrayError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Display for ArrayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on {}: {source}", path.display()),
            Self::Misaligned { path, len } => write!(
                f,
                "{} is {len} bytes, not a multiple of the {WORD_SIZE}-byte word size",
                path.display()
            ),
            Self::ReadOnly(path) => write!(f, "{} is mapped read-only", path.display()),
            Self::OutOfBounds { requested, size } => {
                write!(f, "requested {requested} words but the array holds {size}")
            }
        }
    }
}

impl std::error::Error for ArrayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
