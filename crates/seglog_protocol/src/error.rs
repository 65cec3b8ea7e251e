//! Protocol error types.

use seglog_core::ErrorKind;
use std::io;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or moving frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Transport I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A message could not be encoded.
    #[error("encoding failed: {message}")]
    Encode {
        /// Description of the failure.
        message: String,
    },

    /// A frame body is not a valid message.
    #[error("decoding failed: {message}")]
    Decode {
        /// Description of the failure.
        message: String,
    },

    /// A frame exceeds the maximum body size.
    #[error("frame of {size} bytes exceeds maximum of {max}")]
    FrameTooLarge {
        /// Announced or actual body size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },

    /// The peer closed the connection mid-exchange.
    #[error("connection closed by peer")]
    ConnectionClosed,
}

impl ProtocolError {
    /// Creates an encoding error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a decoding error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Returns the broad kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Io(_) => ErrorKind::IoFailure,
            ProtocolError::ConnectionClosed => ErrorKind::StreamTerminated,
            ProtocolError::Encode { .. }
            | ProtocolError::Decode { .. }
            | ProtocolError::FrameTooLarge { .. } => ErrorKind::InvalidInput,
        }
    }
}
