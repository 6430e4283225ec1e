//! `cachectl`: command-line client for a cache node.
//!
//! ```bash
//! cachectl set greeting hello --ttl 30s --min 1
//! cachectl --server http://localhost:8082 get greeting
//! cachectl del greeting --full
//! ```

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueHint};

use replicated_cache::client::{CacheClient, WriteReceipt};
use replicated_cache::replication::WritePolicy;

#[derive(Parser, Debug)]
#[command(author, version, about = "Talk to a replicated cache node", long_about = None)]
struct Cli {
    /// Base URL of the node to talk to.
    #[arg(long, default_value = "http://localhost:8081", value_hint = ValueHint::Url)]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a key from the node's local copy.
    Get { key: String },
    /// Write a key and replicate it.
    Set {
        key: String,
        value: String,
        /// Expiry such as `30s`, `1h30m` or a plain number of seconds.
        #[arg(long)]
        ttl: Option<String>,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Delete a key and replicate the tombstone.
    Del {
        key: String,
        #[command(flatten)]
        policy: PolicyArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct PolicyArgs {
    /// Minimum number of peer acknowledgements to wait for.
    #[arg(long, default_value_t = 0)]
    min: usize,

    /// Wait for every active peer.
    #[arg(long)]
    full: bool,
}

impl From<PolicyArgs> for WritePolicy {
    fn from(args: PolicyArgs) -> Self {
        WritePolicy {
            min_acks: args.min,
            full: args.full,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = CacheClient::new(cli.server);

    match cli.command {
        Command::Get { key } => {
            let value = client
                .get(&key)
                .await
                .with_context(|| format!("get {key} from {}", client.base()))?;
            match value {
                Some(value) => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&value)?;
                    writeln!(stdout)?;
                }
                None => anyhow::bail!("{key}: not found"),
            }
        }
        Command::Set {
            key,
            value,
            ttl,
            policy,
        } => {
            let receipt = client
                .set(&key, value, ttl.as_deref(), policy.into())
                .await
                .with_context(|| format!("set {key} on {}", client.base()))?;
            print_ok(receipt);
        }
        Command::Del { key, policy } => {
            let receipt = client
                .delete(&key, policy.into())
                .await
                .with_context(|| format!("del {key} on {}", client.base()))?;
            print_ok(receipt);
        }
    }

    Ok(())
}

fn print_ok(receipt: WriteReceipt) {
    match (receipt.acked, receipt.total) {
        (Some(acked), Some(total)) => println!("OK (acked {acked}/{total})"),
        _ => println!("OK"),
    }
}
