//! Replicated entries and the sync message used to ship them between nodes.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The stored unit of replication.
///
/// Every key in a [`Store`](crate::store::Store) maps to exactly one `Entry`.
/// Between two entries for the same key the one with the greater
/// `(version, origin)` pair wins, see [`Entry::supersedes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Vec<u8>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Nanoseconds since the Unix epoch on the origin's clock.
    pub version: i64,
    pub origin: String,
    pub tombstone: bool,
}

impl Entry {
    pub fn live(
        value: Vec<u8>,
        expires_at: Option<DateTime<Utc>>,
        version: i64,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            value,
            expires_at,
            version,
            origin: origin.into(),
            tombstone: false,
        }
    }

    pub fn tombstone(version: i64, origin: impl Into<String>) -> Self {
        Self {
            value: Vec::new(),
            expires_at: None,
            version,
            origin: origin.into(),
            tombstone: true,
        }
    }

    /// True once `now` is strictly past the expiry. Entries without an expiry
    /// never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    /// Whether a reader at `now` should see this entry at all.
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        !self.tombstone && !self.is_expired(now)
    }

    /// Last-write-wins order: version first, origin breaks exact ties.
    pub fn lww_cmp(&self, other: &Entry) -> Ordering {
        (self.version, self.origin.as_str()).cmp(&(other.version, other.origin.as_str()))
    }

    /// Whether this entry should replace `current`.
    pub fn supersedes(&self, current: &Entry) -> bool {
        self.lww_cmp(current) == Ordering::Greater
    }

    /// Builds the sync message that ships this entry to peers.
    pub fn to_sync(&self, key: impl Into<String>) -> SyncMsg {
        if self.tombstone {
            return SyncMsg {
                op: SyncOp::Del,
                key: key.into(),
                value: Vec::new(),
                expires_at: None,
                version: self.version,
                origin: self.origin.clone(),
            };
        }
        SyncMsg {
            op: SyncOp::Set,
            key: key.into(),
            value: self.value.clone(),
            expires_at: self.expires_at,
            version: self.version,
            origin: self.origin.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOp {
    Set,
    Del,
}

/// Wire form of one entry mutation, posted to a peer's `/sync` endpoint.
///
/// Values travel as base64 and expiries as RFC 3339 timestamps so that the
/// JSON stays readable with ordinary tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMsg {
    pub op: SyncOp,
    pub key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "base64_bytes")]
    pub value: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub origin: String,
}

impl SyncMsg {
    /// The entry a receiving node stores for this message. Deletes carry
    /// neither value nor expiry.
    pub fn to_entry(&self) -> Entry {
        match self.op {
            SyncOp::Set => Entry::live(
                self.value.clone(),
                self.expires_at,
                self.version,
                self.origin.clone(),
            ),
            SyncOp::Del => Entry::tombstone(self.version, self.origin.clone()),
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Option::<String>::deserialize(deserializer)?;
        match encoded {
            Some(encoded) => STANDARD.decode(encoded).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
