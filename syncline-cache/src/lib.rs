//! SYNCLINE Cache - Client-Side Fetch Coordination
//!
//! Many independent UI components often want the same remote resource. This
//! crate coordinates them: one component's fetch result is shared with every
//! other component observing the same resource key, mutations propagate to
//! every subscriber, and late-arriving stale responses are discarded so they
//! can never overwrite newer state.
//!
//! # Design Philosophy
//!
//! Staleness is handled by bookkeeping, not cancellation. Every operation
//! mints an epoch from a per-(instance, key) ledger when it starts and
//! re-checks that ledger before committing any effect. A superseded
//! operation's network call runs to completion and its result is silently
//! dropped. This gives last-write-wins by *start order* regardless of
//! completion order, with no locks beyond key-scoped map access.
//!
//! All shared state lives in a single [`CacheContext`] - there are no
//! module-level singletons. Construct one per process and share it behind
//! an `Arc`.
//!
//! # Example
//!
//! ```ignore
//! let ctx = Arc::new(CacheContext::with_defaults());
//!
//! // Observe a resource; the first observer fetches, later ones share.
//! let items = ResourceObserver::observe(
//!     Arc::clone(&ctx),
//!     "/items",
//!     ObserveOptions::new(fetcher).keep_previous_data(true),
//! ).await;
//!
//! // Mutate it and push the response to every observer of "/items".
//! let add = ResourceMutator::mutate(
//!     Arc::clone(&ctx),
//!     "/items",
//!     MutateOptions::new(poster)
//!         .related_read_address("/items")
//!         .use_response_data(true),
//! );
//! add.post(Some(body), None).await;
//! ```

pub mod context;
pub mod epoch;
pub mod mock;
pub mod mutator;
pub mod observer;
pub mod registry;
pub mod store;
pub mod transport;

pub use context::{CacheConfig, CacheContext};
pub use epoch::EpochLedger;
pub use mutator::{
    MutateOptions, MutateOverrides, MutateState, OptimisticData, ResourceMutator,
};
pub use observer::{ObserveOptions, ReadState, ResourceObserver};
pub use registry::{Registration, SubscriberRegistry};
pub use store::CacheStore;
pub use transport::{ResourceFetcher, ResourcePoster};
