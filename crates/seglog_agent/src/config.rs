//! Agent configuration.

use crate::error::{AgentError, AgentResult};
use seglog_core::Config as LogConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// A peer to replicate from as soon as the agent starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Unique node name.
    pub name: String,
    /// RPC address.
    pub addr: String,
}

impl Peer {
    /// Creates a peer.
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
        }
    }
}

/// Configuration for one node.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Directory holding the node's log.
    pub data_dir: PathBuf,
    /// Address the RPC server binds to.
    pub bind_addr: SocketAddr,
    /// Unique node name.
    pub node_name: String,
    /// Peers joined at start.
    pub start_peers: Vec<Peer>,
    /// Access policy file. Everything is allowed without one.
    pub acl_policy_file: Option<PathBuf>,
    /// Shared cluster secret. Enables token authentication when set.
    pub auth_secret: Option<Vec<u8>>,
    /// How long tokens stay valid.
    pub token_expiry: Duration,
    /// Log limits.
    pub log: LogConfig,
}

impl AgentConfig {
    /// Creates a configuration with no peers, no policy and no auth.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        bind_addr: SocketAddr,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            bind_addr,
            node_name: node_name.into(),
            start_peers: Vec::new(),
            acl_policy_file: None,
            auth_secret: None,
            token_expiry: Duration::from_secs(24 * 60 * 60),
            log: LogConfig::default(),
        }
    }

    /// Adds a peer joined at start.
    #[must_use]
    pub fn with_peer(mut self, name: impl Into<String>, addr: impl Into<String>) -> Self {
        self.start_peers.push(Peer::new(name, addr));
        self
    }

    /// Sets the access policy file.
    #[must_use]
    pub fn with_acl_policy(mut self, path: impl Into<PathBuf>) -> Self {
        self.acl_policy_file = Some(path.into());
        self
    }

    /// Enables token authentication with a shared secret.
    #[must_use]
    pub fn with_auth_secret(mut self, secret: Vec<u8>) -> Self {
        self.auth_secret = Some(secret);
        self
    }

    /// Sets the token expiration duration.
    #[must_use]
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Sets the log limits.
    #[must_use]
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Checks the configuration before anything is opened.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] for an empty node name or an
    /// empty secret.
    pub fn validate(&self) -> AgentResult<()> {
        if self.node_name.trim().is_empty() {
            return Err(AgentError::InvalidConfig("node name is empty".into()));
        }
        if self.auth_secret.as_ref().is_some_and(Vec::is_empty) {
            return Err(AgentError::InvalidConfig("auth secret is empty".into()));
        }
        Ok(())
    }
}
