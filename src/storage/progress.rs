//! In-memory progress cache with a retention window.
//!
//! Reads treat expired entries as absent; the sweeper in `main` calls `sweep_expired`
//! periodically to reclaim memory for snapshots nobody polls again.

use super::{now_ms, ProgressStore, StoreResult};
use crate::operations::types::ProgressSnapshot;

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

pub struct MemoryProgressStore {
    /// Structure: `key -> (snapshot, expires_at_ms)`.
    entries: DashMap<String, (ProgressSnapshot, u64)>,
    ttl: Duration,
}

impl MemoryProgressStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Drops every expired snapshot; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn put(&self, key: &str, snapshot: ProgressSnapshot) -> StoreResult<()> {
        let expires_at = now_ms() + self.ttl.as_millis() as u64;
        self.entries.insert(key.to_string(), (snapshot, expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<ProgressSnapshot>> {
        let now = now_ms();
        let fresh = self
            .entries
            .get(key)
            .filter(|entry| entry.value().1 > now)
            .map(|entry| entry.value().0.clone());
        if fresh.is_none() {
            self.entries
                .remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        }
        Ok(fresh)
    }

    async fn sweep_expired(&self) -> StoreResult<usize> {
        Ok(self.purge_expired())
    }
}
