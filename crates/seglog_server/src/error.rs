//! Error types for the log server and client.

use seglog_core::{CoreError, ErrorKind};
use seglog_protocol::{ProtocolError, Status};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the log server or client.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request or request out of sequence.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Authorization failed.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// A policy file could not be loaded.
    #[error("invalid policy {path}: {message}")]
    Policy {
        /// Policy file path.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// The log failed.
    #[error("log error: {0}")]
    Log(#[from] CoreError),

    /// Framing or encoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The remote side answered with an error.
    #[error("remote error ({status}): {message}")]
    Remote {
        /// Status reported by the server.
        status: Status,
        /// Detail reported by the server.
        message: String,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns the broad kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Policy { .. } => ErrorKind::InvalidInput,
            ServerError::AuthenticationFailed(_) | ServerError::NotAuthorized(_) => {
                ErrorKind::PermissionDenied
            }
            ServerError::Log(e) => e.kind(),
            ServerError::Protocol(e) => e.kind(),
            ServerError::Remote { status, .. } => status.kind(),
            ServerError::Internal(_) | ServerError::Io(_) => ErrorKind::IoFailure,
        }
    }

    /// Returns the status a client should receive for this error.
    pub fn status(&self) -> Status {
        match self {
            ServerError::AuthenticationFailed(_) => Status::Unauthenticated,
            ServerError::Remote { status, .. } => *status,
            other => Status::from_kind(other.kind()),
        }
    }

    /// Returns true if this is a client error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.status(),
            Status::BadRequest | Status::Unauthenticated | Status::PermissionDenied | Status::NotFound
        )
    }

    /// Returns true if this is a server error.
    pub fn is_server_error(&self) -> bool {
        self.status() == Status::Internal
    }
}
