//! In-memory last-write-wins map.
//!
//! Both local writes and entries received from peers go through
//! [`Store::put`], so every node resolves a conflicting pair of writes the
//! same way no matter which one it sees first.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::version_time;
use crate::entry::Entry;

/// Thread-safe LWW register map owned by one node.
///
/// A single `RwLock` guards the whole map. Reads share the lock, `put` and
/// the sweep take it exclusively. Critical sections never await and never
/// leave the map half-updated, so a poisoned lock is simply recovered.
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<String, Entry>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored entry as-is, including tombstones and expired
    /// entries. Callers decide visibility with [`Entry::is_visible`].
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stores `incoming` if the key is empty or `incoming` is strictly newer
    /// than the current entry.
    ///
    /// Returns whether the store changed. Replaying an entry that is already
    /// stored returns `false`.
    pub fn put(&self, key: &str, incoming: Entry) -> bool {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        match data.get_mut(key) {
            Some(current) if incoming.supersedes(current) => {
                *current = incoming;
                true
            }
            Some(_) => false,
            None => {
                data.insert(key.to_string(), incoming);
                true
            }
        }
    }

    /// Physically removes expired entries and tombstones older than
    /// `tombstone_ttl`, returning how many were dropped.
    ///
    /// A tombstone's age is measured from its version, i.e. the delete time
    /// on the deleting node's clock.
    pub fn hard_delete_expired(&self, now: DateTime<Utc>, tombstone_ttl: Duration) -> usize {
        let ttl = chrono::Duration::from_std(tombstone_ttl).unwrap_or(chrono::Duration::MAX);
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let before = data.len();
        data.retain(|_, entry| {
            if entry.tombstone {
                now.signed_duration_since(version_time(entry.version)) <= ttl
            } else {
                !entry.is_expired(now)
            }
        });
        before - data.len()
    }

    /// Number of physically stored entries, tombstones included.
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
