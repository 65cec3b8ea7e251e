//! # SegLog Agent
//!
//! Runs one node of a SegLog cluster: opens the log, serves it over TCP
//! and replicates from peers reported by membership.
//!
//! ```rust,ignore
//! use seglog_agent::{Agent, AgentConfig};
//!
//! let config = AgentConfig::new("/var/lib/seglog", "0.0.0.0:8400".parse()?, "node-a")
//!     .with_peer("node-b", "10.0.0.2:8400");
//! let agent = Agent::start(config).await?;
//! // ...
//! agent.shutdown().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod agent;
mod config;
mod error;

pub use agent::Agent;
pub use config::{AgentConfig, Peer};
pub use error::{AgentError, AgentResult};
pub use seglog_replication::MembershipEvent;
