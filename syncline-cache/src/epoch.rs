//! Epoch ledger for staleness rejection.
//!
//! Every fetch or post mints an epoch when it starts and re-checks the
//! ledger before committing any effect. If the ledger has advanced, a newer
//! operation for the same instance+key has started and the older result is
//! discarded silently. Counters only ever increase; the sole reset path is
//! a full cache clear.

use std::collections::HashMap;
use syncline_core::{InstanceId, OpKind, ResourceKey};
use tokio::sync::RwLock;
use tracing::trace;

type LedgerKey = (InstanceId, ResourceKey, OpKind);

/// Per-(instance, key, kind) monotonically increasing counters.
///
/// Reads and writes keep independent counters so an in-flight fetch is
/// never invalidated by a mutation starting, or vice versa. Values are
/// used only for comparison, never interpreted.
#[derive(Debug, Default)]
pub struct EpochLedger {
    counters: RwLock<HashMap<LedgerKey, u64>>,
}

impl EpochLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next epoch for the given triple.
    ///
    /// Reads the current counter (default 0), increments it, stores it
    /// back, and returns the new value. Strictly increasing per triple.
    pub async fn next(&self, instance: InstanceId, key: &ResourceKey, kind: OpKind) -> u64 {
        let mut counters = self.counters.write().await;
        let counter = counters
            .entry((instance, key.clone(), kind))
            .or_insert(0);
        *counter += 1;
        trace!(%instance, %key, %kind, epoch = *counter, "minted epoch");
        *counter
    }

    /// The current epoch for the given triple, if any operation has started.
    pub async fn current(
        &self,
        instance: InstanceId,
        key: &ResourceKey,
        kind: OpKind,
    ) -> Option<u64> {
        let counters = self.counters.read().await;
        counters.get(&(instance, key.clone(), kind)).copied()
    }

    /// Staleness gate: is `epoch` still the most recently minted one?
    pub async fn is_current(
        &self,
        instance: InstanceId,
        key: &ResourceKey,
        kind: OpKind,
        epoch: u64,
    ) -> bool {
        self.current(instance, key, kind).await == Some(epoch)
    }

    /// Wipe every counter. Only called from a full cache clear.
    pub async fn clear(&self) {
        self.counters.write().await.clear();
    }
}
