//! Multi-node tests over real TCP connections.

use seglog_agent::{Agent, AgentConfig, MembershipEvent};
use seglog_core::ErrorKind;
use seglog_server::{AuthConfig, LogClient, TokenValidator};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);
const SECRET: &[u8] = b"cluster-secret-for-agent-tests!";

const POLICY: &str = "\
# clients
p, root, *, produce
p, root, *, consume
# nodes replicate from each other
p, node-0, *, consume
p, node-1, *, consume
p, node-2, *, consume
";

fn write_policy(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("policy.csv");
    std::fs::write(&path, POLICY).unwrap();
    path
}

fn node_config(dir: &TempDir, policy: &Path, index: usize) -> AgentConfig {
    AgentConfig::new(
        dir.path(),
        "127.0.0.1:0".parse().unwrap(),
        format!("node-{index}"),
    )
    .with_acl_policy(policy)
    .with_auth_secret(SECRET.to_vec())
}

fn root_token() -> Vec<u8> {
    TokenValidator::new(AuthConfig::new(SECRET.to_vec()))
        .create_token("root")
        .unwrap()
}

async fn root_client(addr: SocketAddr) -> LogClient {
    let mut client = LogClient::connect(addr).await.unwrap();
    client.hello("root", Some(root_token())).await.unwrap();
    client
}

async fn wait_for_value(addr: SocketAddr, offset: u64, expected: &[u8]) {
    tokio::time::timeout(TIMEOUT, async {
        let mut client = root_client(addr).await;
        loop {
            match client.consume(offset).await {
                Ok(record) => {
                    assert_eq!(&record.value[..], expected);
                    return;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Err(e) => panic!("consume failed: {e}"),
            }
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn followers_replicate_from_leader() {
    let policy_dir = TempDir::new().unwrap();
    let policy = write_policy(policy_dir.path());
    let dirs: Vec<TempDir> = (0..3).map(|_| TempDir::new().unwrap()).collect();

    let leader = Agent::start(node_config(&dirs[0], &policy, 0)).await.unwrap();
    let leader_addr = leader.rpc_addr().to_string();

    let mut followers = Vec::new();
    for index in 1..3 {
        let config = node_config(&dirs[index], &policy, index).with_peer("node-0", &leader_addr);
        followers.push(Agent::start(config).await.unwrap());
    }
    for follower in &followers {
        assert_eq!(follower.replicating_from(), vec!["node-0"]);
    }

    let mut client = root_client(leader.rpc_addr()).await;
    let offset = client.produce(&b"foo"[..]).await.unwrap();
    assert_eq!(offset, 0);
    assert_eq!(&client.consume(offset).await.unwrap().value[..], b"foo");

    for follower in &followers {
        wait_for_value(follower.rpc_addr(), offset, b"foo").await;
    }

    // The leader does not replicate from anyone, so nothing comes back.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let err = client.consume(offset + 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    for follower in &followers {
        follower.shutdown().await.unwrap();
    }
    leader.shutdown().await.unwrap();
}

#[tokio::test]
async fn membership_events_after_start() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let local = "127.0.0.1:0".parse().unwrap();

    let a = Agent::start(AgentConfig::new(dir_a.path(), local, "a")).await.unwrap();
    let b = Agent::start(AgentConfig::new(dir_b.path(), local, "b")).await.unwrap();

    a.log().append(b"from a").unwrap();
    b.handle_event(&MembershipEvent::joined("a", a.rpc_addr().to_string()))
        .unwrap();

    tokio::time::timeout(TIMEOUT, async {
        while b.log().highest_offset().unwrap().is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(b.log().read(0).unwrap(), b"from a");

    b.handle_event(&MembershipEvent::left("a")).unwrap();
    assert!(b.replicating_from().is_empty());

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}

#[tokio::test]
async fn restart_keeps_records() {
    let dir = TempDir::new().unwrap();
    let local = "127.0.0.1:0".parse().unwrap();

    let agent = Agent::start(AgentConfig::new(dir.path(), local, "a")).await.unwrap();
    let mut client = LogClient::connect(agent.rpc_addr()).await.unwrap();
    client.produce(&b"durable"[..]).await.unwrap();
    drop(client);
    agent.shutdown().await.unwrap();
    // The data directory stays locked until the log is dropped.
    drop(agent);

    let agent = Agent::start(AgentConfig::new(dir.path(), local, "a")).await.unwrap();
    let mut client = LogClient::connect(agent.rpc_addr()).await.unwrap();
    assert_eq!(&client.consume(0).await.unwrap().value[..], b"durable");
    assert_eq!(client.produce(&b"next"[..]).await.unwrap(), 1);
    agent.shutdown().await.unwrap();
}
