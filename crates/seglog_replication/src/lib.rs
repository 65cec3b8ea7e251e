//! # SegLog Replication
//!
//! Pull-based replication between SegLog nodes.
//!
//! Each node runs a [`Replicator`]. When membership reports a peer, the
//! replicator opens a stream of the peer's whole log and appends every
//! record it receives to the local log. Delivery is at least once.
//!
//! This crate provides:
//! - [`Replicator`]: one replication task per peer, with join/leave/close
//! - [`MembershipEvent`] and [`MembershipHandler`]: the discovery boundary
//! - [`LocalLog`], [`StreamDialer`], [`RecordStream`]: the capabilities
//!   the replicator is built from
//! - [`TcpDialer`] and [`LoopbackDialer`]: network and in-process dialers
//!
//! # Example
//!
//! ```rust,ignore
//! use seglog_replication::{MembershipEvent, Replicator, ReplicatorConfig, TcpDialer};
//!
//! let replicator = Replicator::new(
//!     ReplicatorConfig::new("node-a"),
//!     Arc::clone(&log),
//!     Arc::new(TcpDialer::new()),
//!     tracing::info_span!("node", name = "node-a"),
//! )?;
//! MembershipEvent::joined("node-b", "10.0.0.2:8400").dispatch(&replicator)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod membership;
mod replicator;
mod transport;

pub use config::{Credentials, ReplicatorConfig};
pub use error::{ReplicationError, ReplicationResult};
pub use membership::{MembershipEvent, MembershipHandler};
pub use replicator::Replicator;
pub use transport::{
    LocalLog, LoopbackDialer, LoopbackStream, RecordStream, StreamDialer, TcpDialer,
    TcpRecordStream,
};
