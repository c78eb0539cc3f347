//! Write coordinator.
//!
//! A [`ResourceMutator`] orchestrates one mutation flow: optional
//! optimistic local and cross-instance updates, the post call through the
//! injected [`ResourcePoster`] under epoch gating, then reconciliation -
//! propagating the result to the related read resource on success, or
//! rolling every touched instance back to its own last snapshot on
//! failure.

use std::sync::{Arc, RwLock};

use futures_util::future::join_all;
use serde_json::Value;
use syncline_core::{
    InstanceId, OpKind, QueryParams, ResourceKey, SynclineError, SynclineResult,
};
use tracing::{debug, trace};

use crate::context::CacheContext;
use crate::transport::ResourcePoster;

/// Snapshot of a mutator's state cell.
#[derive(Debug, Clone, Default)]
pub struct MutateState {
    /// Optimistic value or last confirmed response.
    pub data: Option<Value>,
    /// Whether a post is in flight and no optimistic value is shown.
    pub is_posting: bool,
    /// Last transport failure, cleared on the next successful post.
    pub error: Option<SynclineError>,
}

/// Optimistic value applied before the post resolves.
#[derive(Clone)]
pub enum OptimisticData {
    /// Use this literal value.
    Value(Value),
    /// Compute the value from (previous data, request body).
    Updater(Arc<dyn Fn(Option<&Value>, Option<&Value>) -> Value + Send + Sync>),
}

impl OptimisticData {
    fn resolve(&self, previous: Option<&Value>, body: Option<&Value>) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Updater(updater) => updater(previous, body),
        }
    }
}

impl std::fmt::Debug for OptimisticData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Updater(_) => f.debug_tuple("Updater").finish_non_exhaustive(),
        }
    }
}

/// Hook-level defaults for a mutator.
pub struct MutateOptions {
    poster: Arc<dyn ResourcePoster>,
    query: QueryParams,
    related_read_address: Option<String>,
    related_read_query: QueryParams,
    optimistic: Option<OptimisticData>,
    use_response_data: bool,
}

impl MutateOptions {
    /// Mutate through the given post function.
    pub fn new(poster: Arc<dyn ResourcePoster>) -> Self {
        Self {
            poster,
            query: QueryParams::new(),
            related_read_address: None,
            related_read_query: QueryParams::new(),
            optimistic: None,
            use_response_data: false,
        }
    }

    /// Extend the post address with query parameters.
    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Read resource to synchronize after the mutation.
    pub fn related_read_address(mut self, address: impl Into<String>) -> Self {
        self.related_read_address = Some(address.into());
        self
    }

    /// Query parameters for the related read key.
    pub fn related_read_query(mut self, query: QueryParams) -> Self {
        self.related_read_query = query;
        self
    }

    /// Apply this optimistic update before the post resolves.
    pub fn optimistic(mut self, optimistic: OptimisticData) -> Self {
        self.optimistic = Some(optimistic);
        self
    }

    /// On success, push the response to read subscribers instead of
    /// forcing them to re-fetch.
    pub fn use_response_data(mut self, use_response: bool) -> Self {
        self.use_response_data = use_response;
        self
    }
}

/// Per-call overrides, merged over the hook-level defaults.
#[derive(Default)]
pub struct MutateOverrides {
    /// Override the post-key query parameters.
    pub query: Option<QueryParams>,
    /// Override the related read address.
    pub related_read_address: Option<String>,
    /// Override the related read query parameters.
    pub related_read_query: Option<QueryParams>,
    /// Override the optimistic update.
    pub optimistic: Option<OptimisticData>,
    /// Override the response-propagation mode.
    pub use_response_data: Option<bool>,
}

struct MutatorInner {
    ctx: Arc<CacheContext>,
    instance: InstanceId,
    address: String,
    defaults: MutateOptions,
    state: Arc<RwLock<MutateState>>,
}

/// One component instance mutating a remote resource.
#[derive(Clone)]
pub struct ResourceMutator {
    inner: Arc<MutatorInner>,
}

impl ResourceMutator {
    /// Create a mutator for `address` with the given defaults.
    pub fn mutate(ctx: Arc<CacheContext>, address: &str, options: MutateOptions) -> Self {
        Self {
            inner: Arc::new(MutatorInner {
                ctx,
                instance: InstanceId::mint(),
                address: address.to_string(),
                defaults: options,
                state: Arc::new(RwLock::new(MutateState::default())),
            }),
        }
    }

    /// Run the mutation. The outcome lands in the state cell; transport
    /// failures are surfaced there, never returned.
    pub async fn post(&self, body: Option<Value>, overrides: Option<MutateOverrides>) {
        let inner = &self.inner;
        let overrides = overrides.unwrap_or_default();
        let defaults = &inner.defaults;

        let query = overrides.query.as_ref().unwrap_or(&defaults.query);
        let post_key = ResourceKey::build(&inner.address, query);
        let read_key = overrides
            .related_read_address
            .as_ref()
            .or(defaults.related_read_address.as_ref())
            .map(|address| {
                let read_query = overrides
                    .related_read_query
                    .as_ref()
                    .unwrap_or(&defaults.related_read_query);
                ResourceKey::build(address, read_query)
            });
        let optimistic = overrides.optimistic.as_ref().or(defaults.optimistic.as_ref());
        let use_response_data = overrides
            .use_response_data
            .unwrap_or(defaults.use_response_data);

        let epoch = inner
            .ctx
            .epochs()
            .next(inner.instance, &post_key, OpKind::Write)
            .await;

        // Optimistic update before the network call: own cell first, then
        // every subscriber of the related read key.
        let optimistic_applied = if let Some(optimistic) = optimistic {
            let value = {
                let previous = inner
                    .state
                    .read()
                    .map(|state| state.data.clone())
                    .unwrap_or(None);
                optimistic.resolve(previous.as_ref(), body.as_ref())
            };
            if let Ok(mut state) = inner.state.write() {
                state.data = Some(value.clone());
            }
            if let Some(read_key) = &read_key {
                let subscribers = inner.ctx.registry().registered(read_key).await;
                debug!(key = %read_key, count = subscribers.len(), "pushing optimistic value");
                for (_, registration) in subscribers {
                    (registration.set_data)(Some(value.clone()));
                }
            }
            true
        } else {
            if let Ok(mut state) = inner.state.write() {
                state.is_posting = true;
            }
            false
        };

        let result = inner.defaults.poster.post(&post_key, body.as_ref()).await;

        if !inner
            .ctx
            .epochs()
            .is_current(inner.instance, &post_key, OpKind::Write, epoch)
            .await
        {
            trace!(instance = %inner.instance, key = %post_key, epoch, "discarding stale post");
            return;
        }

        match result {
            Ok(response) => {
                if let Ok(mut state) = inner.state.write() {
                    state.data = Some(response.clone());
                    state.error = None;
                    state.is_posting = false;
                }
                inner
                    .ctx
                    .store()
                    .put_write(inner.instance, &post_key, response.clone())
                    .await;
                debug!(instance = %inner.instance, key = %post_key, epoch, "post committed");

                if let Some(read_key) = &read_key {
                    let subscribers = inner.ctx.registry().registered(read_key).await;
                    if use_response_data {
                        // Push the response directly and overwrite every
                        // known instance's cache entry so late-mounting
                        // observers see it too.
                        for (_, registration) in &subscribers {
                            (registration.set_data)(Some(response.clone()));
                        }
                        let registered: Vec<InstanceId> =
                            subscribers.iter().map(|(instance, _)| *instance).collect();
                        inner
                            .ctx
                            .store()
                            .put_read_for_all_instances(read_key, &response, &registered)
                            .await;
                    } else {
                        debug!(key = %read_key, count = subscribers.len(), "re-fetching read subscribers");
                        join_all(
                            subscribers
                                .into_iter()
                                .map(|(_, registration)| (registration.trigger)()),
                        )
                        .await;
                    }
                }
            }
            Err(err) => {
                if let Ok(mut state) = inner.state.write() {
                    state.error = Some(err);
                    state.is_posting = false;
                }
                if optimistic_applied {
                    // Roll back to the last confirmed response. With no
                    // confirmed response the optimistic value stays.
                    if let Some(confirmed) = inner
                        .ctx
                        .store()
                        .get_write(inner.instance, &post_key)
                        .await
                    {
                        if let Ok(mut state) = inner.state.write() {
                            state.data = Some(confirmed);
                        }
                    }
                    if let Some(read_key) = &read_key {
                        // Each instance rolls back to its own snapshot;
                        // instances without one are left unchanged.
                        for (instance, registration) in
                            inner.ctx.registry().registered(read_key).await
                        {
                            if let Some(snapshot) =
                                inner.ctx.store().get_read(instance, read_key).await
                            {
                                (registration.set_data)(Some(snapshot));
                            }
                        }
                        debug!(key = %read_key, "rolled back optimistic update");
                    }
                }
            }
        }
    }

    /// Snapshot the state cell.
    pub fn state(&self) -> SynclineResult<MutateState> {
        self.inner
            .state
            .read()
            .map(|state| state.clone())
            .map_err(|_| SynclineError::StatePoisoned)
    }

    /// This mutator's instance identity.
    pub fn instance_id(&self) -> InstanceId {
        self.inner.instance
    }

    /// The base address being mutated (before per-call query extension).
    pub fn address(&self) -> &str {
        &self.inner.address
    }
}
