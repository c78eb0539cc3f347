//! Subscriber registry.
//!
//! Maps each resource key to the set of instances currently interested in
//! it. Each registration carries the instance's latest `trigger` (re-fetch)
//! and `set_data` (push) callbacks. Registering again for the same
//! instance+key overwrites the previous registration, so external
//! broadcasts always reach the latest closures.

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use syncline_core::{InstanceId, ResourceKey};
use tokio::sync::RwLock;
use tracing::trace;

/// Zero-arg async re-fetch callback.
pub type TriggerFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Callback that pushes a value into an instance's state cell.
pub type SetDataFn = Arc<dyn Fn(Option<Value>) + Send + Sync>;

/// One instance's callbacks for one resource key.
#[derive(Clone)]
pub struct Registration {
    /// Re-run the instance's fetch.
    pub trigger: TriggerFn,
    /// Push a value directly into the instance's state.
    pub set_data: SetDataFn,
}

impl Registration {
    /// Bundle a trigger and set-data callback.
    pub fn new(trigger: TriggerFn, set_data: SetDataFn) -> Self {
        Self { trigger, set_data }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").finish_non_exhaustive()
    }
}

/// Resource key -> registered instances.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    entries: RwLock<HashMap<ResourceKey, HashMap<InstanceId, Registration>>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) an instance for a key.
    ///
    /// Overwrites any previous registration for the same instance+key, so
    /// the latest trigger/set_data closures always win.
    pub async fn register(
        &self,
        key: &ResourceKey,
        instance: InstanceId,
        registration: Registration,
    ) {
        let mut entries = self.entries.write().await;
        entries
            .entry(key.clone())
            .or_default()
            .insert(instance, registration);
        trace!(%instance, %key, "registered subscriber");
    }

    /// Snapshot of every registration for a key.
    ///
    /// Returns an empty vec for a key nobody observes - broadcasts degrade
    /// to no-ops, never errors.
    pub async fn registered(&self, key: &ResourceKey) -> Vec<(InstanceId, Registration)> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|instances| {
                instances
                    .iter()
                    .map(|(instance, registration)| (*instance, registration.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Instances currently registered for a key.
    pub async fn instances(&self, key: &ResourceKey) -> Vec<InstanceId> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|instances| instances.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Wipe every registration. Only called from a full cache clear.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
