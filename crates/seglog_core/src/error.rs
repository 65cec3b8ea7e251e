//! Error types for SegLog core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Broad classification shared by every SegLog error type.
///
/// Transports map kinds to their own status codes; callers match on the
/// kind instead of on crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested offset lies outside every segment.
    NotFound,
    /// Disk write, read, flush or close failure.
    IoFailure,
    /// An index ran out of pre-allocated space.
    CapacityExceeded,
    /// The authorization check refused the request.
    PermissionDenied,
    /// A replication stream was dropped.
    StreamTerminated,
    /// The component was already shut down.
    Closed,
    /// The caller supplied something unusable.
    InvalidInput,
}

/// Errors that can occur in log and segment operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store or index error.
    #[error("storage error: {0}")]
    Storage(#[from] seglog_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No segment holds the requested offset.
    #[error("offset out of range: {offset}")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u64,
    },

    /// The active segment's index has no room for another entry.
    #[error("segment {base_offset} index full")]
    IndexFull {
        /// Base offset of the full segment.
        base_offset: u64,
    },

    /// Segment files disagree with each other.
    #[error("segment corruption: {message}")]
    SegmentCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The configuration cannot be used.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// Another process holds the data directory.
    #[error("data directory locked: {path}")]
    DataDirLocked {
        /// The locked directory.
        path: PathBuf,
    },

    /// The log is closed.
    #[error("log is closed")]
    LogClosed,
}

impl CoreError {
    /// Creates a segment corruption error.
    pub fn segment_corruption(message: impl Into<String>) -> Self {
        Self::SegmentCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns the broad kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::OffsetOutOfRange { .. } => ErrorKind::NotFound,
            CoreError::IndexFull { .. } => ErrorKind::CapacityExceeded,
            CoreError::InvalidConfig { .. } => ErrorKind::InvalidInput,
            CoreError::LogClosed => ErrorKind::Closed,
            CoreError::Storage(e) if e.is_capacity() => ErrorKind::CapacityExceeded,
            CoreError::Storage(seglog_storage::StorageError::Closed) => ErrorKind::Closed,
            CoreError::Storage(_)
            | CoreError::Io(_)
            | CoreError::SegmentCorruption { .. }
            | CoreError::DataDirLocked { .. } => ErrorKind::IoFailure,
        }
    }

    /// Returns true if the error means the offset does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
