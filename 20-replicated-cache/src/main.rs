//! `cache-node`: serve one replicated cache node over HTTP.
//!
//! Start a 3-node cluster on one machine:
//! ```bash
//! cargo run --bin cache-node -- --addr :8081 --id A \
//!   --peers http://localhost:8082,http://localhost:8083
//! cargo run --bin cache-node -- --addr :8082 --id B \
//!   --peers http://localhost:8081,http://localhost:8083
//! cargo run --bin cache-node -- --addr :8083 --id C \
//!   --peers http://localhost:8081,http://localhost:8082
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use replicated_cache::{cli::NodeArgs, http, node::Node, shutdown};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = NodeArgs::parse();
    let listen_addr = args.listen_addr();
    let node = Arc::new(Node::new(args.node_config())?);

    let (trigger, signal) = shutdown::channel();
    let background = node.spawn_background(signal);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!(
        node = %node.id(),
        addr = %listener.local_addr()?,
        peers = ?node.peers().active_peers(),
        "cache node listening"
    );

    let served = axum::serve(listener, http::router(Arc::clone(&node)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = trigger.send(true);
    for task in background {
        if let Err(err) = task.await {
            warn!(error = ?err, "background task failed");
        }
    }

    served.context("http server failed")?;
    info!(node = %node.id(), "cache node stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = ?err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = ?err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
