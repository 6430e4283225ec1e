//! Replicated in-memory key/value cache.
//!
//! Every node keeps a full copy of the data in memory and serves reads
//! locally. Writes are applied locally first and then pushed to every known
//! peer over HTTP. Conflicts are settled by last-write-wins on the
//! `(version, origin)` pair, where the version is the writer's wall clock in
//! nanoseconds and the origin is the writer's node id.
//!
//! # Architecture
//!
//! - **Request tasks**: one per inbound HTTP request (axum)
//! - **Replication tasks**: one short-lived task per peer per write
//! - **Health monitor**: probes peers periodically and evicts dead ones
//! - **Janitor**: sweeps expired entries and old tombstones
//!
//! There is no leader and no membership protocol. Peers are configured at
//! startup and only ever removed.
//!
//! # Modules
//!
//! - [`entry`]: the replicated entry and the sync wire message
//! - [`store`]: concurrent last-write-wins map
//! - [`peers`]: peer set with failure counting
//! - [`replication`]: quorum fan-out to peers
//! - [`health`] / [`janitor`]: background loops
//! - [`node`]: composes the above into one node
//! - [`http`]: axum routes
//! - [`client`]: reqwest client for the routes, used by `cachectl`
//! - [`cli`]: `cache-node` command-line flags

pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod health;
pub mod http;
pub mod janitor;
pub mod node;
pub mod peers;
pub mod replication;
pub mod shutdown;
pub mod store;
