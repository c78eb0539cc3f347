//! Process-wide cache context.
//!
//! A single object owning every shared map: the epoch ledger, the
//! subscriber registry, and the cache store. Constructed once per process
//! and shared behind an `Arc`; there are no module-level singletons, and
//! the explicit [`clear_all`](CacheContext::clear_all) reset exists for
//! test isolation and full resets.

use std::time::Duration;

use futures_util::future::join_all;
use syncline_core::ResourceKey;
use tracing::debug;

use crate::epoch::EpochLedger;
use crate::registry::SubscriberRegistry;
use crate::store::CacheStore;

/// Configuration for the coordination engine.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Delay before a failed fetch with no data retries.
    ///
    /// Retries are not capped and have no backoff: a read that keeps
    /// failing while its instance holds no data keeps retrying at this
    /// interval until it succeeds or is superseded by a newer epoch.
    pub retry_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl CacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Shared state for every observer and mutator in the process.
#[derive(Debug)]
pub struct CacheContext {
    epochs: EpochLedger,
    registry: SubscriberRegistry,
    store: CacheStore,
    config: CacheConfig,
}

impl CacheContext {
    /// Create a context with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            epochs: EpochLedger::new(),
            registry: SubscriberRegistry::new(),
            store: CacheStore::new(),
            config,
        }
    }

    /// Create a context with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// The epoch ledger.
    pub fn epochs(&self) -> &EpochLedger {
        &self.epochs
    }

    /// The subscriber registry.
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// The cache store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// The engine configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Re-run the fetch of every instance registered for `key`.
    ///
    /// Triggers run concurrently; there is no return value and a key with
    /// no subscribers is a no-op. Each trigger gates itself on its own
    /// epoch, so a refresh can never resurrect stale data.
    pub async fn refresh(&self, key: &ResourceKey) {
        let subscribers = self.registry.registered(key).await;
        if subscribers.is_empty() {
            return;
        }
        debug!(%key, count = subscribers.len(), "refreshing subscribers");
        join_all(
            subscribers
                .into_iter()
                .map(|(_, registration)| (registration.trigger)()),
        )
        .await;
    }

    /// Wipe every map: registrations, both epoch ledgers, both store sides.
    ///
    /// After this, observing any previously cached key behaves exactly
    /// like the very first observation ever made for it.
    pub async fn clear_all(&self) {
        debug!("clearing all cache state");
        self.registry.clear().await;
        self.epochs.clear().await;
        self.store.clear().await;
    }
}
