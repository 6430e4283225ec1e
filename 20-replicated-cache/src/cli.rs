use std::time::Duration;

use clap::Parser;

use crate::clock::{parse_duration, parse_interval};
use crate::config::NodeConfig;
use crate::peers::DEFAULT_MAX_FAILURES;

/// Command-line flags of the `cache-node` binary.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Run a replicated in-memory cache node")]
pub struct NodeArgs {
    /// Listen address. A bare `:port` binds every interface.
    #[arg(long, default_value = ":8081")]
    pub addr: String,

    /// Comma-separated peer base URLs, e.g. http://localhost:8082,http://localhost:8083
    #[arg(long, value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Node id used as the origin of local writes (defaults to addr#random)
    #[arg(long)]
    pub id: Option<String>,

    /// Heartbeat interval
    #[arg(long, default_value = "5s", value_parser = parse_interval)]
    pub hb: Duration,

    /// Replication deadline for one write
    #[arg(long = "req-timeout", default_value = "4s", value_parser = parse_duration)]
    pub req_timeout: Duration,

    /// Timeout of each individual peer request (probes and deliveries)
    #[arg(long = "probe-timeout", default_value = "5s", value_parser = parse_duration)]
    pub probe_timeout: Duration,

    /// Interval between janitor sweeps
    #[arg(long = "janitor-every", default_value = "2s", value_parser = parse_interval)]
    pub janitor_every: Duration,

    /// How long tombstones are retained after a delete
    #[arg(long = "tombstone-ttl", default_value = "5m", value_parser = parse_duration)]
    pub tombstone_ttl: Duration,

    /// Consecutive failures before a peer is dropped
    #[arg(long = "max-failures", default_value_t = DEFAULT_MAX_FAILURES)]
    pub max_failures: u32,
}

impl NodeArgs {
    /// Socket address to bind, expanding the `:port` shorthand.
    pub fn listen_addr(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }

    pub fn node_config(&self) -> NodeConfig {
        let id = self
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("{}#{:04x}", self.addr, rand::random::<u16>()));

        let mut config = NodeConfig::new(id, self.peers.clone());
        config.heartbeat_interval = self.hb;
        config.replication_timeout = self.req_timeout;
        config.request_timeout = self.probe_timeout;
        config.janitor_interval = self.janitor_every;
        config.tombstone_ttl = self.tombstone_ttl;
        config.max_failures = self.max_failures;
        config
    }
}
