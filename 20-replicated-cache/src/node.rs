//! A single cache node.
//!
//! [`Node`] owns the store and the peer registry and exposes the operations
//! the HTTP layer serves: local reads, replicated writes and deletes, and the
//! inbound sync path peers use to push their writes here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use chrono::Utc;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{version_at, version_now};
use crate::config::NodeConfig;
use crate::entry::{Entry, SyncMsg};
use crate::error::WriteError;
use crate::health::run_health_monitor;
use crate::janitor::run_janitor;
use crate::peers::PeerRegistry;
use crate::replication::{Acks, Replicator, WritePolicy, peer_client};
use crate::shutdown::ShutdownSignal;
use crate::store::Store;

pub struct Node {
    config: NodeConfig,
    store: Arc<Store>,
    peers: Arc<PeerRegistry>,
    client: Client,
    replicator: Replicator,
}

impl Node {
    /// Builds a node with an empty store and the configured peers active.
    ///
    /// # Errors
    /// Fails if a background interval is zero or the peer HTTP client cannot
    /// be constructed.
    pub fn new(config: NodeConfig) -> Result<Self> {
        ensure!(
            !config.heartbeat_interval.is_zero(),
            "heartbeat interval must be greater than zero"
        );
        ensure!(
            !config.janitor_interval.is_zero(),
            "janitor interval must be greater than zero"
        );
        let client =
            peer_client(config.request_timeout).context("failed to build peer HTTP client")?;
        let peers = Arc::new(PeerRegistry::new(&config.peers, config.max_failures));
        let replicator = Replicator::new(
            client.clone(),
            Arc::clone(&peers),
            config.replication_timeout,
        );
        Ok(Self {
            config,
            store: Arc::new(Store::new()),
            peers,
            client,
            replicator,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn peers(&self) -> &Arc<PeerRegistry> {
        &self.peers
    }

    /// Reads a key from local state. Expired and deleted keys read as
    /// absent even if the janitor has not swept them yet.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.store
            .get(key)
            .filter(|entry| entry.is_visible(Utc::now()))
            .map(|entry| entry.value)
    }

    /// Writes `value` locally, then replicates it according to `policy`.
    ///
    /// A zero `ttl` means no expiry. If the local store already holds a
    /// newer version the write is rejected as stale and nothing is sent to
    /// peers. A replication shortfall is reported as an error, but the local
    /// write stays in place.
    pub async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        policy: WritePolicy,
    ) -> Result<Acks, WriteError> {
        let now = Utc::now();
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));
        let entry = Entry::live(value, expires_at, version_at(now), self.id());

        let msg = entry.to_sync(key);
        if !self.store.put(key, entry) {
            debug!(key, "local write lost to a newer version");
            return Err(WriteError::Stale);
        }
        self.replicate(msg, policy).await
    }

    /// Tombstones `key` locally and replicates the delete.
    ///
    /// Deletes are replicated even when the local tombstone loses to a
    /// newer entry; peers apply the same LWW rule on arrival.
    pub async fn delete(&self, key: &str, policy: WritePolicy) -> Result<Acks, WriteError> {
        let entry = Entry::tombstone(version_now(), self.id());
        let msg = entry.to_sync(key);
        if !self.store.put(key, entry) {
            debug!(key, "local tombstone lost to a newer version");
        }
        self.replicate(msg, policy).await
    }

    /// Applies a write pushed by a peer. Returns whether the store changed.
    ///
    /// This path never replicates: every write travels exactly one hop from
    /// its origin, which keeps a full mesh from rebroadcasting forever.
    pub fn apply_sync(&self, msg: &SyncMsg) -> bool {
        let applied = self.store.put(&msg.key, msg.to_entry());
        debug!(
            key = %msg.key,
            op = ?msg.op,
            version = msg.version,
            origin = %msg.origin,
            applied,
            "applied sync"
        );
        applied
    }

    /// Starts the health monitor and the janitor. Both stop when `shutdown`
    /// fires.
    pub fn spawn_background(&self, shutdown: ShutdownSignal) -> Vec<JoinHandle<()>> {
        info!(
            node = %self.config.id,
            peers = self.peers.len(),
            heartbeat = ?self.config.heartbeat_interval,
            janitor = ?self.config.janitor_interval,
            "starting background tasks"
        );
        vec![
            tokio::spawn(run_health_monitor(
                self.client.clone(),
                Arc::clone(&self.peers),
                self.config.heartbeat_interval,
                shutdown.clone(),
            )),
            tokio::spawn(run_janitor(
                Arc::clone(&self.store),
                self.config.janitor_interval,
                self.config.tombstone_ttl,
                shutdown,
            )),
        ]
    }

    async fn replicate(&self, msg: SyncMsg, policy: WritePolicy) -> Result<Acks, WriteError> {
        match self.replicator.replicate(&msg, policy).await {
            Ok(acks) => Ok(acks),
            Err(err) => {
                warn!(key = %msg.key, error = %err, "replication target not met");
                Err(err.into())
            }
        }
    }
}
