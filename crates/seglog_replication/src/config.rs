//! Replicator configuration.

/// Identity presented to peers when opening a replication stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Subject claimed in the hello.
    pub subject: String,
    /// Signed token, for peers that require authentication.
    pub token: Option<Vec<u8>>,
}

impl Credentials {
    /// Creates credentials without a token.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            token: None,
        }
    }

    /// Attaches a token.
    #[must_use]
    pub fn with_token(mut self, token: Vec<u8>) -> Self {
        self.token = Some(token);
        self
    }
}

/// Configuration for a replicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicatorConfig {
    /// Name of the local node. Join events for it are ignored.
    pub local_name: String,
    /// Credentials used when dialing peers.
    pub credentials: Option<Credentials>,
}

impl ReplicatorConfig {
    /// Creates a configuration for the named local node.
    pub fn new(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            credentials: None,
        }
    }

    /// Sets the credentials used when dialing peers.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}
