//! Error types for the agent.

use seglog_core::{CoreError, ErrorKind};
use seglog_replication::ReplicationError;
use seglog_server::ServerError;
use thiserror::Error;

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that can occur while starting, running or stopping an agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The log failed.
    #[error("log error: {0}")]
    Log(#[from] CoreError),

    /// The server failed.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// Replication failed.
    #[error("replication error: {0}")]
    Replication(#[from] ReplicationError),
}

impl AgentError {
    /// Returns the broad kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::InvalidConfig(_) => ErrorKind::InvalidInput,
            AgentError::Log(e) => e.kind(),
            AgentError::Server(e) => e.kind(),
            AgentError::Replication(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_pass_through() {
        assert_eq!(
            AgentError::from(CoreError::LogClosed).kind(),
            ErrorKind::Closed
        );
        assert_eq!(
            AgentError::from(ReplicationError::Closed).kind(),
            ErrorKind::Closed
        );
        assert_eq!(
            AgentError::InvalidConfig("empty node name".into()).kind(),
            ErrorKind::InvalidInput
        );
    }
}
