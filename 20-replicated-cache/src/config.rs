use std::time::Duration;

use crate::peers::DEFAULT_MAX_FAILURES;

/// Identity, peers and timing for one cache node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Node id stamped as the origin of local writes. Ties between writes
    /// with the same version go to the lexicographically greater id.
    pub id: String,
    /// Peer base URLs, e.g. `http://127.0.0.1:8082`.
    pub peers: Vec<String>,
    /// Deadline for a whole replication fan-out.
    pub replication_timeout: Duration,
    /// Per-request timeout of the peer HTTP client (probes and deliveries).
    pub request_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub janitor_interval: Duration,
    /// How long tombstones are kept after the delete before the janitor may
    /// drop them.
    pub tombstone_ttl: Duration,
    pub max_failures: u32,
}

impl NodeConfig {
    pub fn new(id: impl Into<String>, peers: Vec<String>) -> Self {
        Self {
            id: id.into(),
            peers,
            replication_timeout: Duration::from_secs(4),
            request_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(5),
            janitor_interval: Duration::from_secs(2),
            tombstone_ttl: Duration::from_secs(5 * 60),
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}
