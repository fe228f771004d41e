//! Index configuration module.
//!
//! This module provides configuration loading for reverse index builds and
//! merges from environment variables.
//!
//! # Environment Variables
//!
//! - `INDEX_WORDS_BLOCK_SIZE`: Page size of the words tree (default: `64`)
//! - `INDEX_DOCS_BLOCK_SIZE`: Page size of each documents tree (default: `128`)
//! - `INDEX_DOCS_ENTRY_SIZE`: Words per documents tree entry, `1` for bare
//!   document ids or `2` for id plus metadata (default: `2`)
//! - `INDEX_MAX_LAYERS`: Maximum index depth of any tree (default: `5`)
//!
//! # Invariants
//!
//! - Block sizes are powers of two between 4 and 4096
//! - `docs_entry_size` is 1 or 2
//! - `max_layers` is at least 1

use crate::btree::{BTreeBlockSize, BTreeContext};

/// Reverse index configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()`, every field satisfies the module
/// invariants, so the contexts derived from it are always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Page size of the words tree.
    pub words_block_size: BTreeBlockSize,
    /// Page size of each documents tree.
    pub docs_block_size: BTreeBlockSize,
    /// Words per documents tree entry.
    pub docs_entry_size: usize,
    /// Maximum number of index layers in any tree.
    pub max_layers: usize,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            words_block_size: BTreeBlockSize::BS_64,
            docs_block_size: BTreeBlockSize::BS_128,
            docs_entry_size: Self::DEFAULT_DOCS_ENTRY_SIZE,
            max_layers: Self::DEFAULT_MAX_LAYERS,
        }
    }
}

impl IndexConfig {
    /// Default page size of the words tree.
    pub const DEFAULT_WORDS_BLOCK_SIZE: usize = 64;
    /// Default page size of each documents tree.
    pub const DEFAULT_DOCS_BLOCK_SIZE: usize = 128;
    /// Default words per documents tree entry.
    pub const DEFAULT_DOCS_ENTRY_SIZE: usize = 2;
    /// Default maximum index depth.
    pub const DEFAULT_MAX_LAYERS: usize = 5;

    /// Words per words tree entry: word id and documents tree offset.
    pub const WORDS_ENTRY_SIZE: usize = 2;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unset variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let words_block_size = Self::load_block_size(
            &lookup,
            "INDEX_WORDS_BLOCK_SIZE",
            Self::DEFAULT_WORDS_BLOCK_SIZE,
        )?;
        let docs_block_size = Self::load_block_size(
            &lookup,
            "INDEX_DOCS_BLOCK_SIZE",
            Self::DEFAULT_DOCS_BLOCK_SIZE,
        )?;
        let docs_entry_size = Self::load_docs_entry_size(&lookup)?;
        let max_layers = Self::load_max_layers(&lookup)?;

        Ok(Self {
            words_block_size,
            docs_block_size,
            docs_entry_size,
            max_layers,
        })
    }

    /// Context for the words tree.
    #[must_use]
    pub const fn words_context(&self) -> BTreeContext {
        BTreeContext::new(self.max_layers, Self::WORDS_ENTRY_SIZE, self.words_block_size)
    }

    /// Context for documents trees.
    #[must_use]
    pub const fn docs_context(&self) -> BTreeContext {
        BTreeContext::new(self.max_layers, self.docs_entry_size, self.docs_block_size)
    }

    /// Load a block size.
    ///
    /// Returns the default if not set.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a power of two between 4 and 4096.
    fn load_block_size<F>(
        lookup: &F,
        name: &str,
        default: usize,
    ) -> Result<BTreeBlockSize, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = lookup(name);
        let page_size = match &value {
            Some(value) => value.parse::<usize>().ok(),
            None => Some(default),
        };

        page_size
            .and_then(BTreeBlockSize::from_page_size)
            .ok_or_else(|| ConfigError::InvalidValue {
                name: name.to_string(),
                message: format!(
                    "'{}' is not a power of two between 4 and 4096",
                    value.unwrap_or_default()
                ),
            })
    }

    /// Load the documents entry size.
    ///
    /// Returns the default if not set.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is set to anything but 1 or 2.
    fn load_docs_entry_size<F>(lookup: &F) -> Result<usize, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("INDEX_DOCS_ENTRY_SIZE") {
            Some(value) => match value.parse::<usize>() {
                Ok(size @ (1 | 2)) => Ok(size),
                _ => Err(ConfigError::InvalidValue {
                    name: "INDEX_DOCS_ENTRY_SIZE".to_string(),
                    message: format!("'{value}' must be 1 or 2"),
                }),
            },
            None => Ok(Self::DEFAULT_DOCS_ENTRY_SIZE),
        }
    }

    /// Load the maximum index depth.
    ///
    /// Returns the default if not set.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is set but not a positive integer.
    fn load_max_layers<F>(lookup: &F) -> Result<usize, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("INDEX_MAX_LAYERS") {
            Some(value) => match value.parse::<usize>() {
                Ok(layers) if layers >= 1 => Ok(layers),
                _ => Err(ConfigError::InvalidValue {
                    name: "INDEX_MAX_LAYERS".to_string(),
                    message: format!("'{value}' is not a positive integer"),
                }),
            },
            None => Ok(Self::DEFAULT_MAX_LAYERS),
        }
    }
}
