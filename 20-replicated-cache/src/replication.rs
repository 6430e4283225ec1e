//! Fan-out of sync messages to peers.
//!
//! A write on one node is pushed to every active peer at once. The caller
//! decides how many acknowledgements it needs before the write counts as
//! replicated; deliveries that are still running when that target is met
//! keep going in the background and only feed peer health.
//!
//! Delivery is best-effort and at-least-once. A failed delivery is not
//! retried within the same call. The next write to the key carries a newer
//! version, and peers resolve any redelivery with the same LWW rule.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::entry::SyncMsg;
use crate::error::ReplicationError;
use crate::peers::PeerRegistry;

/// Acknowledgement counts of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Acks {
    pub acked: usize,
    /// Active peers at the moment the fan-out started.
    pub total: usize,
}

/// How many acknowledgements a write waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WritePolicy {
    pub min_acks: usize,
    /// Wait for every active peer, overriding `min_acks`.
    pub full: bool,
}

impl WritePolicy {
    pub fn min(min_acks: usize) -> Self {
        Self {
            min_acks,
            full: false,
        }
    }

    pub fn full() -> Self {
        Self {
            min_acks: 0,
            full: true,
        }
    }
}

#[derive(Debug, Error)]
enum DeliveryError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("status {0}")]
    Status(StatusCode),
}

/// Builds the HTTP client used for every peer-facing call. `timeout` bounds
/// each individual request.
pub fn peer_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(timeout).build()
}

pub struct Replicator {
    client: Client,
    peers: Arc<PeerRegistry>,
    deadline: Duration,
}

impl Replicator {
    /// `deadline` bounds the whole fan-out, not each delivery.
    pub fn new(client: Client, peers: Arc<PeerRegistry>, deadline: Duration) -> Self {
        Self {
            client,
            peers,
            deadline,
        }
    }

    /// Pushes `msg` to every active peer and waits for the policy's target.
    ///
    /// The target is every peer for a full write, otherwise `min_acks`
    /// capped at the number of active peers. Returns as soon as the target
    /// is met. On failure the error carries the partial counts.
    pub async fn replicate(
        &self,
        msg: &SyncMsg,
        policy: WritePolicy,
    ) -> Result<Acks, ReplicationError> {
        let peers = self.peers.active_peers();
        let total = peers.len();
        if total == 0 {
            if policy.min_acks > 0 || policy.full {
                return Err(ReplicationError::NoPeers);
            }
            return Ok(Acks::default());
        }

        let target = if policy.full {
            total
        } else {
            policy.min_acks.min(total)
        };
        let deadline = Instant::now() + self.deadline;

        // Sized to the peer count so stragglers can always finish their send.
        let (results_tx, mut results_rx) = mpsc::channel(total);
        let msg = Arc::new(msg.clone());
        for peer in peers {
            self.spawn_delivery(peer, Arc::clone(&msg), results_tx.clone());
        }
        drop(results_tx);

        let mut acked = 0;
        let mut first_error: Option<String> = None;
        while acked < target {
            match timeout_at(deadline, results_rx.recv()).await {
                Ok(Some(Ok(()))) => acked += 1,
                Ok(Some(Err(err))) => {
                    first_error.get_or_insert(err);
                }
                Ok(None) => {
                    return Err(ReplicationError::Insufficient {
                        acked,
                        total,
                        target,
                        first_error: first_error.unwrap_or_default(),
                    });
                }
                Err(_) => {
                    warn!(key = %msg.key, acked, total, target, "replication timed out");
                    return Err(ReplicationError::Timeout {
                        acked,
                        total,
                        target,
                    });
                }
            }
        }

        debug!(key = %msg.key, acked, total, target, "replication target met");
        Ok(Acks { acked, total })
    }

    fn spawn_delivery(
        &self,
        peer: String,
        msg: Arc<SyncMsg>,
        results: mpsc::Sender<Result<(), String>>,
    ) {
        let client = self.client.clone();
        let registry = Arc::clone(&self.peers);
        tokio::spawn(async move {
            let outcome = deliver(&client, &peer, &msg).await;
            registry.record_outcome(&peer, outcome.is_ok());
            let outcome = outcome.map_err(|err| {
                debug!(peer = %peer, key = %msg.key, error = %err, "sync delivery failed");
                format!("{peer}: {err}")
            });
            // The collector may already have returned; nobody is waiting then.
            let _ = results.try_send(outcome);
        });
    }
}

async fn deliver(client: &Client, peer: &str, msg: &SyncMsg) -> Result<(), DeliveryError> {
    let response = client.post(format!("{peer}/sync")).json(msg).send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(DeliveryError::Status(status))
    }
}
