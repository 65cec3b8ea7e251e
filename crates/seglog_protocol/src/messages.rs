//! Request and response messages.

use bytes::Bytes;
use seglog_core::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current protocol version, sent in [`Request::Hello`].
pub const PROTOCOL_VERSION: u16 = 1;

/// A record as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Offset assigned by the serving log.
    pub offset: u64,
    /// Record payload.
    pub value: Bytes,
}

impl From<seglog_core::Record> for Record {
    fn from(record: seglog_core::Record) -> Self {
        Self {
            offset: record.offset,
            value: Bytes::from(record.value),
        }
    }
}

/// A message sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Introduces the client. Must come first when the server requires
    /// authentication.
    Hello {
        /// Client protocol version.
        version: u16,
        /// Claimed subject. Ignored in favour of the token's subject when a
        /// token is checked.
        subject: String,
        /// Signed token, if the client has one.
        token: Option<Bytes>,
    },

    /// Appends a record.
    Produce {
        /// Payload to append.
        value: Bytes,
    },

    /// Reads one record.
    Consume {
        /// Offset to read.
        offset: u64,
    },

    /// Streams records from `offset` onwards until the connection closes.
    /// The server answers with a [`Response::Consume`] per record.
    ConsumeStream {
        /// First offset to send.
        offset: u64,
    },
}

impl Request {
    /// Creates a hello without a token.
    pub fn hello(subject: impl Into<String>) -> Self {
        Request::Hello {
            version: PROTOCOL_VERSION,
            subject: subject.into(),
            token: None,
        }
    }

    /// Short name of the request, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Hello { .. } => "hello",
            Request::Produce { .. } => "produce",
            Request::Consume { .. } => "consume",
            Request::ConsumeStream { .. } => "consume_stream",
        }
    }
}

/// A message sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Accepts a hello.
    Hello {
        /// Subject the server will authorize requests as.
        subject: String,
    },

    /// Acknowledges an append.
    Produce {
        /// Offset assigned to the record.
        offset: u64,
    },

    /// One record, for both single reads and streams.
    Consume {
        /// The record.
        record: Record,
    },

    /// The request failed.
    Error {
        /// Failure class.
        status: Status,
        /// Human-readable detail.
        message: String,
    },
}

impl Response {
    /// Creates an error response.
    pub fn error(status: Status, message: impl Into<String>) -> Self {
        Response::Error {
            status,
            message: message.into(),
        }
    }
}

/// Failure classes reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The request was malformed or arrived out of order.
    BadRequest,
    /// No valid credentials were presented.
    Unauthenticated,
    /// The subject may not perform the action.
    PermissionDenied,
    /// The offset does not exist.
    NotFound,
    /// The server failed.
    Internal,
}

impl Status {
    /// Maps an error kind to the status reported for it.
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::PermissionDenied => Status::PermissionDenied,
            ErrorKind::InvalidInput => Status::BadRequest,
            ErrorKind::IoFailure
            | ErrorKind::CapacityExceeded
            | ErrorKind::StreamTerminated
            | ErrorKind::Closed => Status::Internal,
        }
    }

    /// Maps a status back to the error kind a client should see.
    pub fn kind(self) -> ErrorKind {
        match self {
            Status::NotFound => ErrorKind::NotFound,
            Status::PermissionDenied | Status::Unauthenticated => ErrorKind::PermissionDenied,
            Status::BadRequest => ErrorKind::InvalidInput,
            Status::Internal => ErrorKind::IoFailure,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::BadRequest => "bad request",
            Status::Unauthenticated => "unauthenticated",
            Status::PermissionDenied => "permission denied",
            Status::NotFound => "not found",
            Status::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_error_kind() {
        assert_eq!(Status::from_kind(ErrorKind::NotFound), Status::NotFound);
        assert_eq!(
            Status::from_kind(ErrorKind::PermissionDenied),
            Status::PermissionDenied
        );
        assert_eq!(Status::from_kind(ErrorKind::IoFailure), Status::Internal);
        assert_eq!(Status::NotFound.kind(), ErrorKind::NotFound);
        assert_eq!(Status::Unauthenticated.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn record_from_core() {
        let record = Record::from(seglog_core::Record {
            offset: 4,
            value: b"x".to_vec(),
        });
        assert_eq!(record.offset, 4);
        assert_eq!(record.value, Bytes::from_static(b"x"));
    }

    #[test]
    fn request_names() {
        assert_eq!(Request::hello("a").name(), "hello");
        assert_eq!(Request::ConsumeStream { offset: 0 }.name(), "consume_stream");
    }
}
