//! Serve command implementation.

use seglog_agent::{Agent, AgentConfig};
use seglog_core::Config;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Everything needed to run a node.
#[derive(Debug)]
pub struct ServeOptions {
    /// Directory holding the node's log.
    pub data_dir: PathBuf,
    /// RPC bind address.
    pub bind: SocketAddr,
    /// Unique node name.
    pub node_name: String,
    /// Start peers as (name, addr).
    pub peers: Vec<(String, String)>,
    /// Access policy file.
    pub acl_policy: Option<PathBuf>,
    /// Shared cluster secret.
    pub auth_secret: Option<String>,
    /// Segment limits.
    pub log: Config,
}

impl ServeOptions {
    fn agent_config(self) -> AgentConfig {
        let mut config = AgentConfig::new(self.data_dir, self.bind, self.node_name)
            .with_log_config(self.log);
        for (name, addr) in self.peers {
            config = config.with_peer(name, addr);
        }
        if let Some(path) = self.acl_policy {
            config = config.with_acl_policy(path);
        }
        if let Some(secret) = self.auth_secret {
            config = config.with_auth_secret(secret.into_bytes());
        }
        config
    }
}

/// Parses a `name=addr` peer argument.
pub fn parse_peer(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, addr)) if !name.is_empty() && !addr.is_empty() => {
            Ok((name.to_owned(), addr.to_owned()))
        }
        _ => Err(format!("expected name=addr, got {arg:?}")),
    }
}

/// Runs the serve command until Ctrl-C.
pub fn run(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.agent_config();
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let agent = Agent::start(config).await?;
        println!(
            "node {} serving {} on {}",
            agent.node_name(),
            agent.log().path().display(),
            agent.rpc_addr()
        );

        tokio::signal::ctrl_c().await?;
        tracing::info!("interrupt received, shutting down");
        agent.shutdown().await?;
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_argument() {
        assert_eq!(
            parse_peer("node-b=10.0.0.2:8400").unwrap(),
            ("node-b".to_owned(), "10.0.0.2:8400".to_owned())
        );
        assert!(parse_peer("node-b").is_err());
        assert!(parse_peer("=10.0.0.2:8400").is_err());
        assert!(parse_peer("node-b=").is_err());
    }

    #[test]
    fn options_become_agent_config() {
        let options = ServeOptions {
            data_dir: PathBuf::from("/tmp/node"),
            bind: "127.0.0.1:0".parse().unwrap(),
            node_name: "a".into(),
            peers: vec![("b".into(), "127.0.0.1:9".into())],
            acl_policy: None,
            auth_secret: Some("secret".into()),
            log: Config::new().max_store_bytes(2048),
        };
        let config = options.agent_config();
        assert_eq!(config.node_name, "a");
        assert_eq!(config.start_peers.len(), 1);
        assert_eq!(config.auth_secret.as_deref(), Some(&b"secret"[..]));
        assert_eq!(config.log.max_store_bytes, 2048);
    }
}
