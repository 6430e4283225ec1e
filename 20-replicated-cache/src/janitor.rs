//! Background garbage collection of expired entries and old tombstones.
//!
//! Reads already hide expired and deleted keys; the janitor only reclaims
//! the memory.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::select;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::shutdown::{self, ShutdownSignal};
use crate::store::Store;

pub async fn run_janitor(
    store: Arc<Store>,
    every: Duration,
    tombstone_ttl: Duration,
    mut shutdown: ShutdownSignal,
) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            _ = shutdown::requested(&mut shutdown) => break,
            _ = ticker.tick() => {
                let removed = store.hard_delete_expired(Utc::now(), tombstone_ttl);
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "janitor sweep");
                }
            }
        }
    }
    info!("janitor stopped");
}
