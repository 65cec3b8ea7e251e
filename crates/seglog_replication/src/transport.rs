//! Capabilities the replicator needs from its surroundings.
//!
//! The replicator never sees the agent, the server or a socket. It gets:
//! - a [`LocalLog`] to append replicated records to
//! - a [`StreamDialer`] that opens a [`RecordStream`] to a peer
//!
//! [`TcpDialer`] speaks the SegLog wire protocol; [`LoopbackDialer`]
//! connects to logs in the same process.

use crate::config::Credentials;
use crate::error::{ReplicationError, ReplicationResult};
use parking_lot::RwLock;
use seglog_core::{Log, LogFollower};
use seglog_protocol::Record;
use seglog_server::{ConsumeStream, LogClient};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Appends records to the local log.
pub trait LocalLog: Send + Sync + 'static {
    /// Appends a payload and returns the local offset it received.
    fn append(&self, value: &[u8]) -> ReplicationResult<u64>;
}

impl LocalLog for Log {
    fn append(&self, value: &[u8]) -> ReplicationResult<u64> {
        Ok(Log::append(self, value)?)
    }
}

/// An ordered stream of records from a peer.
pub trait RecordStream: Send + 'static {
    /// Waits for the next record. `Ok(None)` means the peer ended the stream.
    fn next_record(&mut self) -> impl Future<Output = ReplicationResult<Option<Record>>> + Send;
}

/// Opens record streams to peers.
pub trait StreamDialer: Send + Sync + 'static {
    /// Stream type produced by this dialer.
    type Stream: RecordStream;

    /// Connects to `addr` and requests every record from `offset` onwards.
    fn dial(
        &self,
        addr: &str,
        offset: u64,
    ) -> impl Future<Output = ReplicationResult<Self::Stream>> + Send;
}

/// Dials peers over TCP with [`LogClient`].
#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    credentials: Option<Credentials>,
}

impl TcpDialer {
    /// Creates a dialer that skips the hello.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dialer that says hello with the given credentials.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }
}

impl StreamDialer for TcpDialer {
    type Stream = TcpRecordStream;

    async fn dial(&self, addr: &str, offset: u64) -> ReplicationResult<TcpRecordStream> {
        let mut client = LogClient::connect(addr)
            .await
            .map_err(|e| ReplicationError::dial(addr, e.to_string()))?;
        if let Some(credentials) = &self.credentials {
            client
                .hello(&credentials.subject, credentials.token.clone())
                .await?;
        }
        let stream = client.consume_stream(offset).await?;
        Ok(TcpRecordStream { stream })
    }
}

/// Records arriving over a TCP connection.
#[derive(Debug)]
pub struct TcpRecordStream {
    stream: ConsumeStream,
}

impl RecordStream for TcpRecordStream {
    async fn next_record(&mut self) -> ReplicationResult<Option<Record>> {
        Ok(self.stream.next_record().await?)
    }
}

/// Dials logs living in the same process, keyed by address.
#[derive(Debug, Default)]
pub struct LoopbackDialer {
    peers: RwLock<HashMap<String, Arc<Log>>>,
}

impl LoopbackDialer {
    /// Creates a dialer with no reachable peers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `log` reachable at `addr`.
    pub fn register(&self, addr: impl Into<String>, log: Arc<Log>) {
        self.peers.write().insert(addr.into(), log);
    }

    /// Makes `addr` unreachable for new dials.
    pub fn unregister(&self, addr: &str) {
        self.peers.write().remove(addr);
    }
}

impl StreamDialer for LoopbackDialer {
    type Stream = LoopbackStream;

    async fn dial(&self, addr: &str, offset: u64) -> ReplicationResult<LoopbackStream> {
        let log = self
            .peers
            .read()
            .get(addr)
            .cloned()
            .ok_or_else(|| ReplicationError::dial(addr, "no such peer"))?;
        Ok(LoopbackStream {
            follower: log.follow(offset),
        })
    }
}

/// Records read straight from an in-process log.
#[derive(Debug)]
pub struct LoopbackStream {
    follower: LogFollower,
}

impl RecordStream for LoopbackStream {
    async fn next_record(&mut self) -> ReplicationResult<Option<Record>> {
        Ok(self.follower.next_record().await?.map(Record::from))
    }
}
