//! Per-instance cache store.
//!
//! Holds the last-known value per (instance, resource key), split into a
//! read side and a write side. The read side seeds late-mounting observers
//! and is the per-instance rollback source after a failed optimistic
//! mutation. The write side holds the last *confirmed* post response,
//! which is the mutator's own rollback source. Entries live for process
//! lifetime; there is no eviction.

use serde_json::Value;
use std::collections::HashMap;
use syncline_core::{InstanceId, ResourceKey};
use tokio::sync::RwLock;

type StoreKey = (InstanceId, ResourceKey);

/// Last-known values keyed by (instance, resource key).
#[derive(Debug, Default)]
pub struct CacheStore {
    reads: RwLock<HashMap<StoreKey, Value>>,
    writes: RwLock<HashMap<StoreKey, Value>>,
}

impl CacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last fetched (or pushed) value for an instance+key.
    pub async fn get_read(&self, instance: InstanceId, key: &ResourceKey) -> Option<Value> {
        let reads = self.reads.read().await;
        reads.get(&(instance, key.clone())).cloned()
    }

    /// Record a fetched (or pushed) value for an instance+key.
    pub async fn put_read(&self, instance: InstanceId, key: &ResourceKey, value: Value) {
        let mut reads = self.reads.write().await;
        reads.insert((instance, key.clone()), value);
    }

    /// Any instance's cached value for a key, in arbitrary iteration order.
    ///
    /// Used to seed a `keep_previous_data` observer. There is no "freshest"
    /// ordering among equal-key entries; the first found wins.
    pub async fn any_read_for_key(&self, key: &ResourceKey) -> Option<Value> {
        let reads = self.reads.read().await;
        reads
            .iter()
            .find(|((_, entry_key), _)| entry_key == key)
            .map(|(_, value)| value.clone())
    }

    /// Overwrite the read entry for every known instance for a key.
    ///
    /// "Known" is the union of instances that already hold an entry for
    /// the key and the `also` list (typically the currently registered
    /// subscribers), so late-mounting observers see the new value too.
    pub async fn put_read_for_all_instances(
        &self,
        key: &ResourceKey,
        value: &Value,
        also: &[InstanceId],
    ) {
        let mut reads = self.reads.write().await;
        let holders: Vec<InstanceId> = reads
            .keys()
            .filter(|(_, entry_key)| entry_key == key)
            .map(|(instance, _)| *instance)
            .collect();
        for instance in holders.iter().chain(also.iter()) {
            reads.insert((*instance, key.clone()), value.clone());
        }
    }

    /// Last confirmed post response for an instance+key.
    pub async fn get_write(&self, instance: InstanceId, key: &ResourceKey) -> Option<Value> {
        let writes = self.writes.read().await;
        writes.get(&(instance, key.clone())).cloned()
    }

    /// Record a confirmed post response for an instance+key.
    pub async fn put_write(&self, instance: InstanceId, key: &ResourceKey, value: Value) {
        let mut writes = self.writes.write().await;
        writes.insert((instance, key.clone()), value);
    }

    /// Wipe both sides. Only called from a full cache clear.
    pub async fn clear(&self) {
        self.reads.write().await.clear();
        self.writes.write().await.clear();
    }
}
