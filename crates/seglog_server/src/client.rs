//! TCP client for the log service.

use crate::error::{ServerError, ServerResult};
use bytes::Bytes;
use seglog_protocol::{
    read_frame, write_frame, ProtocolError, Record, Request, Response, PROTOCOL_VERSION,
};
use tokio::net::{TcpStream, ToSocketAddrs};

/// A connection to a log server.
#[derive(Debug)]
pub struct LogClient {
    stream: TcpStream,
}

impl LogClient {
    /// Connects to a server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(addr: impl ToSocketAddrs) -> ServerResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Introduces the client and returns the subject the server accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Remote`] if the server rejects the hello.
    pub async fn hello(&mut self, subject: &str, token: Option<Vec<u8>>) -> ServerResult<String> {
        let request = Request::Hello {
            version: PROTOCOL_VERSION,
            subject: subject.to_owned(),
            token: token.map(Bytes::from),
        };
        match self.call(&request).await? {
            Response::Hello { subject } => Ok(subject),
            other => Err(unexpected(&other)),
        }
    }

    /// Appends a record and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses or the connection fails.
    pub async fn produce(&mut self, value: impl Into<Bytes>) -> ServerResult<u64> {
        let request = Request::Produce {
            value: value.into(),
        };
        match self.call(&request).await? {
            Response::Produce { offset } => Ok(offset),
            other => Err(unexpected(&other)),
        }
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Remote`] with [`seglog_protocol::Status::NotFound`]
    /// if the offset does not exist.
    pub async fn consume(&mut self, offset: u64) -> ServerResult<Record> {
        match self.call(&Request::Consume { offset }).await? {
            Response::Consume { record } => Ok(record),
            other => Err(unexpected(&other)),
        }
    }

    /// Turns the connection into a stream of records from `offset` onwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn consume_stream(mut self, offset: u64) -> ServerResult<ConsumeStream> {
        write_frame(&mut self.stream, &Request::ConsumeStream { offset }).await?;
        Ok(ConsumeStream {
            stream: self.stream,
        })
    }

    async fn call(&mut self, request: &Request) -> ServerResult<Response> {
        write_frame(&mut self.stream, request).await?;
        match read_frame(&mut self.stream).await? {
            Some(Response::Error { status, message }) => Err(ServerError::Remote { status, message }),
            Some(response) => Ok(response),
            None => Err(ProtocolError::ConnectionClosed.into()),
        }
    }
}

/// Records pushed by the server after [`LogClient::consume_stream`].
#[derive(Debug)]
pub struct ConsumeStream {
    stream: TcpStream,
}

impl ConsumeStream {
    /// Waits for the next record.
    ///
    /// Returns `Ok(None)` when the server ends the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the server reports a failure or the connection
    /// breaks mid-frame.
    pub async fn next_record(&mut self) -> ServerResult<Option<Record>> {
        match read_frame(&mut self.stream).await? {
            None => Ok(None),
            Some(Response::Consume { record }) => Ok(Some(record)),
            Some(Response::Error { status, message }) => Err(ServerError::Remote { status, message }),
            Some(other) => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> ServerError {
    ProtocolError::decode(format!("unexpected response: {response:?}")).into()
}
