//! In-process cluster harness shared by the integration tests.
//!
//! Every node serves the real router on an ephemeral localhost port. The
//! background loops are not started; tests drive probes explicitly.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use replicated_cache::client::CacheClient;
use replicated_cache::config::NodeConfig;
use replicated_cache::http::router;
use replicated_cache::node::Node;
use replicated_cache::shutdown;

pub struct TestNode {
    pub node: Arc<Node>,
    pub url: String,
    trigger: watch::Sender<bool>,
    server: JoinHandle<std::io::Result<()>>,
}

impl TestNode {
    /// Serves a node with the given peers on a fresh port.
    pub async fn spawn(id: &str, peers: Vec<String>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Self::serve(listener, test_config(id, peers))
    }

    fn serve(listener: TcpListener, config: NodeConfig) -> Result<Self> {
        let url = format!("http://{}", listener.local_addr()?);
        let node = Arc::new(Node::new(config)?);
        let (trigger, mut signal) = shutdown::channel();
        let app = router(Arc::clone(&node));
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown::requested(&mut signal).await })
                .await
        });
        Ok(Self {
            node,
            url,
            trigger,
            server,
        })
    }

    pub fn client(&self) -> CacheClient {
        CacheClient::new(self.url.clone())
    }

    pub async fn stop(self) -> Result<()> {
        let _ = self.trigger.send(true);
        tokio::time::timeout(Duration::from_secs(5), self.server)
            .await
            .context("server did not stop")??
            .context("server failed")?;
        Ok(())
    }
}

/// A full mesh of nodes, each also configured with `extra_peers`.
pub struct TestCluster {
    nodes: Vec<TestNode>,
}

impl TestCluster {
    pub async fn spawn(n: usize, extra_peers: &[String]) -> Result<Self> {
        let mut listeners = Vec::with_capacity(n);
        for _ in 0..n {
            listeners.push(TcpListener::bind("127.0.0.1:0").await?);
        }
        let urls = listeners
            .iter()
            .map(|listener| Ok(format!("http://{}", listener.local_addr()?)))
            .collect::<Result<Vec<_>>>()?;

        let mut nodes = Vec::with_capacity(n);
        for (i, listener) in listeners.into_iter().enumerate() {
            let peers = urls
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, url)| url.clone())
                .chain(extra_peers.iter().cloned())
                .collect();
            let config = test_config(&format!("N{}", i + 1), peers);
            nodes.push(TestNode::serve(listener, config)?);
        }
        Ok(Self { nodes })
    }

    /// 1-indexed, matching the `N1..Nn` ids.
    pub fn node(&self, id: usize) -> &TestNode {
        &self.nodes[id - 1]
    }

    pub fn nodes(&self) -> &[TestNode] {
        &self.nodes
    }

    pub async fn shutdown(self) -> Result<()> {
        for node in self.nodes {
            node.stop().await?;
        }
        Ok(())
    }
}

fn test_config(id: &str, peers: Vec<String>) -> NodeConfig {
    let mut config = NodeConfig::new(id, peers);
    config.request_timeout = Duration::from_secs(1);
    config.replication_timeout = Duration::from_secs(2);
    config
}

/// URL of a port nothing listens on. Connections are refused immediately.
pub async fn dead_peer() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

/// Polls `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

/// A peer that accepts connections and never answers. Abort the returned
/// task to close the held connections.
pub async fn silent_peer() -> Result<(String, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    Ok((url, task))
}
