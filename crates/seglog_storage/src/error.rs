//! Error types for store and index operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a store.
    #[error("read beyond end of store: position {position}, size {size}")]
    ReadPastEnd {
        /// The requested read position.
        position: u64,
        /// The current store size.
        size: u64,
    },

    /// The pre-allocated index region has no room for another entry.
    #[error("index full: {capacity} bytes mapped")]
    IndexFull {
        /// Size of the mapped region in bytes.
        capacity: u64,
    },

    /// The requested index entry has not been written.
    #[error("index entry {entry} not found ({entries} entries)")]
    EntryNotFound {
        /// The requested entry slot.
        entry: u64,
        /// Number of entries currently in the index.
        entries: u64,
    },

    /// The file contents are inconsistent.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The file could not be memory-mapped.
    #[error("failed to map {path}: {source}")]
    Map {
        /// The file being mapped.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The store or index is closed.
    #[error("storage is closed")]
    Closed,
}

impl StorageError {
    /// Returns true if this error means the index ran out of space.
    pub fn is_capacity(&self) -> bool {
        matches!(self, StorageError::IndexFull { .. })
    }

    /// Returns true if this error is a lookup miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::EntryNotFound { .. } | StorageError::ReadPastEnd { .. }
        )
    }
}
