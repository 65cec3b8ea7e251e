//! Error types for replication.

use seglog_core::{CoreError, ErrorKind};
use seglog_server::ServerError;
use thiserror::Error;

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Errors that can occur while replicating from peers.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// The replicator was closed.
    #[error("replicator is closed")]
    Closed,

    /// A peer could not be reached.
    #[error("failed to dial {addr}: {message}")]
    Dial {
        /// Peer address.
        addr: String,
        /// Error message.
        message: String,
    },

    /// The local log refused a record.
    #[error("local log error: {0}")]
    Log(#[from] CoreError),

    /// The connection to a peer failed.
    #[error("peer connection error: {0}")]
    Server(#[from] ServerError),

    /// No tokio runtime was available at construction.
    #[error("no tokio runtime: {0}")]
    NoRuntime(String),
}

impl ReplicationError {
    /// Creates a dial error.
    pub fn dial(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dial {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// Returns the broad kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplicationError::Closed => ErrorKind::Closed,
            ReplicationError::Dial { .. } => ErrorKind::StreamTerminated,
            ReplicationError::Log(e) => e.kind(),
            ReplicationError::Server(e) => e.kind(),
            ReplicationError::NoRuntime(_) => ErrorKind::InvalidInput,
        }
    }
}
