use thiserror::Error;

use crate::clock::DurationParseError;
use crate::replication::Acks;

/// Why a fan-out did not reach its acknowledgement target.
///
/// Every variant reports the progress made so far. The local write that
/// triggered replication is never rolled back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplicationError {
    #[error("no peers available")]
    NoPeers,
    #[error("timeout waiting for {target}/{total} acks (got {acked})")]
    Timeout {
        acked: usize,
        total: usize,
        target: usize,
    },
    #[error("only {acked}/{total} peers acknowledged, needed {target}: {first_error}")]
    Insufficient {
        acked: usize,
        total: usize,
        target: usize,
        first_error: String,
    },
}

impl ReplicationError {
    pub fn acks(&self) -> Acks {
        match self {
            ReplicationError::NoPeers => Acks::default(),
            ReplicationError::Timeout { acked, total, .. }
            | ReplicationError::Insufficient { acked, total, .. } => Acks {
                acked: *acked,
                total: *total,
            },
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    /// The local store already holds a newer version of the key.
    #[error("write lost to newer version")]
    Stale,
    #[error("replication error: {0}")]
    Replication(#[from] ReplicationError),
}

/// Malformed client or peer requests. All map to `400 Bad Request`.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("missing key")]
    MissingKey,
    #[error("bad ttl: {0}")]
    BadTtl(#[from] DurationParseError),
    #[error("bad min: {0:?} is not a non-negative integer")]
    BadMin(String),
    #[error("bad full: {0:?} is not a boolean")]
    BadFull(String),
    #[error("bad sync message: {0}")]
    BadSync(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid server URL {0:?}")]
    BadBase(String),
    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}
