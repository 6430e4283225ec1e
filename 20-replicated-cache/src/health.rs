//! Periodic liveness probing of peers.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::{Client, StatusCode};
use tokio::select;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::peers::PeerRegistry;
use crate::shutdown::{self, ShutdownSignal};

/// Probes every active peer once per `every` until shutdown.
///
/// The first round runs one interval after start. A round that is already
/// probing when shutdown arrives is allowed to finish.
pub async fn run_health_monitor(
    client: Client,
    peers: Arc<PeerRegistry>,
    every: Duration,
    mut shutdown: ShutdownSignal,
) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            _ = shutdown::requested(&mut shutdown) => break,
            _ = ticker.tick() => {
                probe_peers(&client, &peers).await;
            }
        }
    }
    info!("health monitor stopped");
}

/// Runs one probe round concurrently across the active peers and records
/// every result. Returns how many peers answered healthy.
pub async fn probe_peers(client: &Client, peers: &PeerRegistry) -> usize {
    let targets = peers.active_peers();
    let results = join_all(targets.iter().map(|peer| probe(client, peer))).await;

    let mut healthy = 0;
    for (peer, ok) in targets.iter().zip(results) {
        if ok {
            healthy += 1;
        }
        peers.record_outcome(peer, ok);
    }
    debug!(healthy, probed = targets.len(), "probe round finished");
    healthy
}

async fn probe(client: &Client, peer: &str) -> bool {
    match client.get(format!("{peer}/health")).send().await {
        Ok(response) if response.status() == StatusCode::OK => true,
        Ok(response) => {
            debug!(peer, status = %response.status(), "health probe rejected");
            false
        }
        Err(err) => {
            debug!(peer, error = %err, "health probe failed");
            false
        }
    }
}
