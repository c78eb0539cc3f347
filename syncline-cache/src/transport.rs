//! Injected transport seams.
//!
//! The engine never talks to the network itself. Callers inject a fetch
//! function per observer and a post function per mutator; both exchange
//! `serde_json::Value` payloads and must fail with a [`SynclineError`] on
//! any non-success transport outcome.

use async_trait::async_trait;
use serde_json::Value;
use syncline_core::{ResourceKey, SynclineResult};

/// Fetch function injected into a [`ResourceObserver`](crate::ResourceObserver).
///
/// Must be idempotent and safe to call repeatedly and concurrently: the
/// engine does not deduplicate in-flight calls, it only discards stale
/// results.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the resource identified by `key`.
    async fn fetch(&self, key: &ResourceKey) -> SynclineResult<Value>;
}

/// Post function injected into a [`ResourceMutator`](crate::ResourceMutator).
#[async_trait]
pub trait ResourcePoster: Send + Sync {
    /// Send a mutation to the resource identified by `key`.
    async fn post(&self, key: &ResourceKey, body: Option<&Value>) -> SynclineResult<Value>;
}
