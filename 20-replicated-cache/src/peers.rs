//! Locally configured peer set with failure-based eviction.
//!
//! There is no membership protocol. Each node starts from its own peer list
//! and drops a peer once it fails `max_failures` times in a row, whether the
//! failure came from a health probe or from a replication delivery. Evicted
//! peers never come back for the lifetime of the process.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, warn};

pub const DEFAULT_MAX_FAILURES: u32 = 3;

#[derive(Debug)]
pub struct PeerRegistry {
    state: RwLock<PeerState>,
    max_failures: u32,
}

#[derive(Debug, Default)]
struct PeerState {
    active: BTreeSet<String>,
    failures: HashMap<String, u32>,
}

impl PeerRegistry {
    /// Builds the registry from configured base URLs such as
    /// `http://127.0.0.1:8082`. Entries are trimmed, trailing slashes are
    /// dropped and blanks are ignored.
    pub fn new<I, S>(initial: I, max_failures: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let active = initial
            .into_iter()
            .filter_map(|peer| normalize_peer(peer.as_ref()))
            .collect();
        Self {
            state: RwLock::new(PeerState {
                active,
                failures: HashMap::new(),
            }),
            max_failures: max_failures.max(1),
        }
    }

    /// Snapshot of the peers that are currently active, in sorted order.
    pub fn active_peers(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .iter()
            .cloned()
            .collect()
    }

    /// Feeds one probe or delivery result into the failure counter.
    ///
    /// Success resets the counter. Failure increments it and evicts the peer
    /// once it reaches the threshold; the return value says whether this call
    /// did the evicting. Results for peers that are no longer active are
    /// ignored, so a late delivery cannot bring an evicted peer back.
    pub fn record_outcome(&self, peer: &str, success: bool) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.active.contains(peer) {
            return false;
        }

        if success {
            state.failures.insert(peer.to_string(), 0);
            return false;
        }

        let failures = state.failures.entry(peer.to_string()).or_insert(0);
        *failures += 1;
        let count = *failures;
        if count < self.max_failures {
            debug!(peer, failures = count, "peer failure recorded");
            return false;
        }

        state.active.remove(peer);
        state.failures.remove(peer);
        warn!(peer, failures = count, "peer exceeded failure threshold; removing");
        true
    }

    /// Consecutive failures recorded for an active peer.
    pub fn failure_count(&self, peer: &str) -> Option<u32> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if !state.active.contains(peer) {
            return None;
        }
        Some(state.failures.get(peer).copied().unwrap_or(0))
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_peer(raw: &str) -> Option<String> {
    let peer = raw.trim().trim_end_matches('/');
    (!peer.is_empty()).then(|| peer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: &str = "http://127.0.0.1:9001";

    #[test]
    fn normalizes_configured_peers() {
        let registry = PeerRegistry::new(
            [" http://a:1/ ", "", "http://b:2", "http://a:1"],
            DEFAULT_MAX_FAILURES,
        );
        assert_eq!(registry.active_peers(), vec!["http://a:1", "http://b:2"]);
    }

    #[test]
    fn evicts_after_consecutive_failures() {
        let registry = PeerRegistry::new([PEER], 3);
        assert!(!registry.record_outcome(PEER, false));
        assert!(!registry.record_outcome(PEER, false));
        assert_eq!(registry.failure_count(PEER), Some(2));
        assert!(registry.record_outcome(PEER, false));
        assert!(registry.is_empty());
        assert_eq!(registry.failure_count(PEER), None);
    }

    #[test]
    fn success_resets_the_counter() {
        let registry = PeerRegistry::new([PEER], 3);
        registry.record_outcome(PEER, false);
        registry.record_outcome(PEER, false);
        registry.record_outcome(PEER, true);
        assert_eq!(registry.failure_count(PEER), Some(0));

        registry.record_outcome(PEER, false);
        registry.record_outcome(PEER, false);
        assert_eq!(registry.active_peers(), vec![PEER]);
    }

    #[test]
    fn evicted_peers_do_not_rejoin() {
        let registry = PeerRegistry::new([PEER], 1);
        assert!(registry.record_outcome(PEER, false));
        assert!(!registry.record_outcome(PEER, true));
        assert!(registry.active_peers().is_empty());
    }

    #[test]
    fn registries_are_independent() {
        let first = PeerRegistry::new([PEER], 1);
        let second = PeerRegistry::new([PEER], 1);
        first.record_outcome(PEER, false);
        assert!(first.is_empty());
        assert_eq!(second.len(), 1);
    }
}
