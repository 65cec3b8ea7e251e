//! A running node: log, server and replicator wired together.

use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use parking_lot::Mutex;
use seglog_core::Log;
use seglog_replication::{Credentials, MembershipEvent, Replicator, ReplicatorConfig, TcpDialer};
use seglog_server::{
    AclAuthorizer, AllowAll, AuthConfig, Authorizer, LogServer, LogService, ServerConfig,
    TokenValidator,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{Instrument, Span};

/// One cluster node.
///
/// The log opens first and closes last. Replication stops before the
/// server drains so nothing is appended while connections wind down.
///
/// With a shared secret set, the token presented to peers is issued once
/// at start and expires after `token_expiry`.
///
/// Call [`Agent::shutdown`] before dropping. Dropping a running agent
/// cancels replication but cannot wait for the server.
pub struct Agent {
    config: AgentConfig,
    log: Arc<Log>,
    server: Mutex<Option<LogServer>>,
    replicator: Replicator<Log, TcpDialer>,
    rpc_addr: SocketAddr,
    shut_down: AtomicBool,
    span: Span,
}

impl Agent {
    /// Opens the log, starts serving and joins every start peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the log cannot be
    /// opened, the policy file cannot be read or the address cannot be
    /// bound. Nothing started before the failure is left running.
    pub async fn start(config: AgentConfig) -> AgentResult<Self> {
        let span = tracing::info_span!("agent", node = %config.node_name);
        Self::start_with_span(config, span).await
    }

    /// Like [`Agent::start`], with every log line and task of the agent
    /// recorded under `span`.
    ///
    /// # Errors
    ///
    /// See [`Agent::start`].
    pub async fn start_with_span(config: AgentConfig, span: Span) -> AgentResult<Self> {
        config.validate()?;

        let log = Arc::new(Log::open(&config.data_dir, config.log.clone())?);
        let authorizer = load_authorizer(&config)?;

        let mut server_config = ServerConfig::new(config.bind_addr);
        let mut credentials = Credentials::new(config.node_name.clone());
        if let Some(secret) = &config.auth_secret {
            server_config = server_config
                .with_auth(secret.clone())
                .with_token_expiry(config.token_expiry);
            let issuer = TokenValidator::new(
                AuthConfig::new(secret.clone()).with_expiry(config.token_expiry),
            );
            credentials = credentials.with_token(issuer.create_token(&config.node_name)?);
        }

        let service = Arc::new(LogService::from_config(
            Arc::clone(&log),
            authorizer,
            &server_config,
        )?);
        let replicator = Replicator::new(
            ReplicatorConfig::new(config.node_name.clone()).with_credentials(credentials.clone()),
            Arc::clone(&log),
            Arc::new(TcpDialer::with_credentials(credentials)),
            span.clone(),
        )?;
        let server = LogServer::bind(&server_config, service)
            .instrument(span.clone())
            .await?;
        let rpc_addr = server.local_addr();

        let agent = Self {
            config,
            log,
            server: Mutex::new(Some(server)),
            replicator,
            rpc_addr,
            shut_down: AtomicBool::new(false),
            span,
        };

        for peer in &agent.config.start_peers {
            agent.handle_event(&MembershipEvent::joined(&peer.name, &peer.addr))?;
        }

        tracing::info!(parent: &agent.span, %rpc_addr, "agent started");
        Ok(agent)
    }

    /// Applies a membership event to the replicator.
    ///
    /// # Errors
    ///
    /// Returns an error after shutdown.
    pub fn handle_event(&self, event: &MembershipEvent) -> AgentResult<()> {
        tracing::debug!(parent: &self.span, peer = event.name(), "membership event");
        event.dispatch(&self.replicator)?;
        Ok(())
    }

    /// Address the RPC server is listening on.
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    /// The node's log.
    pub fn log(&self) -> &Arc<Log> {
        &self.log
    }

    /// The node's name.
    pub fn node_name(&self) -> &str {
        &self.config.node_name
    }

    /// Names of peers currently being replicated from.
    pub fn replicating_from(&self) -> Vec<String> {
        self.replicator.active_peers()
    }

    /// Returns true once [`Agent::shutdown`] has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stops replication, the server and the log, in that order.
    ///
    /// Every step runs even if an earlier one fails. Calling this again is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub async fn shutdown(&self) -> AgentResult<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut first_error: Option<AgentError> = None;

        self.replicator.close();

        let server = self.server.lock().take();
        if let Some(server) = server {
            if let Err(e) = server.shutdown().instrument(self.span.clone()).await {
                tracing::error!(parent: &self.span, error = %e, "server shutdown failed");
                first_error.get_or_insert(e.into());
            }
        }

        if let Err(e) = self.log.close() {
            tracing::error!(parent: &self.span, error = %e, "log close failed");
            first_error.get_or_insert(e.into());
        }

        tracing::info!(parent: &self.span, "agent shut down");
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("node_name", &self.config.node_name)
            .field("rpc_addr", &self.rpc_addr)
            .field("data_dir", &self.config.data_dir)
            .field("is_shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

fn load_authorizer(config: &AgentConfig) -> AgentResult<Arc<dyn Authorizer>> {
    match &config.acl_policy_file {
        Some(path) => Ok(Arc::new(AclAuthorizer::from_file(path)?)),
        None => Ok(Arc::new(AllowAll)),
    }
}
