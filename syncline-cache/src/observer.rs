//! Read coordinator.
//!
//! A [`ResourceObserver`] is one component instance's view of a remote
//! resource: a state cell (`data` / `is_loading` / `error`), a registered
//! place in the subscriber registry, and a `trigger` operation that fetches
//! through the injected [`ResourceFetcher`] under epoch gating.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures_util::future::BoxFuture;
use serde_json::Value;
use syncline_core::{
    InstanceId, OpKind, QueryParams, ResourceKey, SynclineError, SynclineResult,
};
use tracing::{debug, trace};

use crate::context::CacheContext;
use crate::registry::Registration;
use crate::transport::ResourceFetcher;

/// Snapshot of an observer's state cell.
#[derive(Debug, Clone, Default)]
pub struct ReadState {
    /// Last committed value, if any.
    pub data: Option<Value>,
    /// Whether a fetch is in flight and no stale data is being shown.
    pub is_loading: bool,
    /// Last transport failure, cleared on the next successful fetch.
    pub error: Option<SynclineError>,
}

/// Options for observing a resource.
pub struct ObserveOptions {
    fetcher: Arc<dyn ResourceFetcher>,
    query: QueryParams,
    keep_previous_data: bool,
}

impl ObserveOptions {
    /// Observe through the given fetch function.
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            query: QueryParams::new(),
            keep_previous_data: false,
        }
    }

    /// Extend the resource address with query parameters.
    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Seed `data` from any other instance's cached value for the same key
    /// and suppress the loading flag while re-fetching.
    pub fn keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }
}

struct ObserverInner {
    ctx: Arc<CacheContext>,
    instance: InstanceId,
    key: ResourceKey,
    fetcher: Arc<dyn ResourceFetcher>,
    keep_previous_data: bool,
    state: Arc<RwLock<ReadState>>,
    auto_started: AtomicBool,
}

impl ObserverInner {
    /// One fetch attempt under epoch gating.
    ///
    /// Boxed because the retry path schedules another call to itself.
    fn run_trigger(self: &Arc<Self>) -> BoxFuture<'static, ()> {
        let this = Arc::clone(self);
        Box::pin(async move {
            let epoch = this
                .ctx
                .epochs()
                .next(this.instance, &this.key, OpKind::Read)
                .await;

            if !this.keep_previous_data {
                if let Ok(mut state) = this.state.write() {
                    state.is_loading = true;
                }
            }

            let result = this.fetcher.fetch(&this.key).await;

            if !this
                .ctx
                .epochs()
                .is_current(this.instance, &this.key, OpKind::Read, epoch)
                .await
            {
                trace!(instance = %this.instance, key = %this.key, epoch, "discarding stale fetch");
                return;
            }

            match result {
                Ok(value) => {
                    this.ctx
                        .store()
                        .put_read(this.instance, &this.key, value.clone())
                        .await;
                    if let Ok(mut state) = this.state.write() {
                        state.data = Some(value);
                        state.error = None;
                        state.is_loading = false;
                    }
                    debug!(instance = %this.instance, key = %this.key, epoch, "fetch committed");
                }
                Err(err) => {
                    let should_retry = match this.state.write() {
                        Ok(mut state) => {
                            state.error = Some(err);
                            state.is_loading = false;
                            state.data.is_none()
                        }
                        Err(_) => false,
                    };
                    // A failed read with nothing to show retries until it
                    // succeeds or a newer epoch supersedes it. No backoff,
                    // no cap.
                    if should_retry {
                        let retry = Arc::clone(&this);
                        let delay = this.ctx.config().retry_delay;
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            if retry
                                .ctx
                                .epochs()
                                .is_current(retry.instance, &retry.key, OpKind::Read, epoch)
                                .await
                            {
                                debug!(instance = %retry.instance, key = %retry.key, "retrying failed fetch");
                                retry.run_trigger().await;
                            }
                        });
                    }
                }
            }
        })
    }

    /// (Re-)register the latest closures for this instance+key.
    async fn register(self: &Arc<Self>) {
        let trigger_inner = Arc::clone(self);
        let trigger = Arc::new(move || trigger_inner.run_trigger());

        let cell = Arc::clone(&self.state);
        let set_data = Arc::new(move |value: Option<Value>| {
            if let Ok(mut state) = cell.write() {
                state.data = value;
                state.is_loading = false;
            }
        });

        self.ctx
            .registry()
            .register(&self.key, self.instance, Registration::new(trigger, set_data))
            .await;
    }
}

/// One component instance observing a remote resource.
#[derive(Clone)]
pub struct ResourceObserver {
    inner: Arc<ObserverInner>,
}

impl ResourceObserver {
    /// Start observing `address` (extended with the options' query params).
    ///
    /// Registers the instance in the subscriber registry, seeds its state
    /// from the shared cache when `keep_previous_data` is set, and - if no
    /// data is held - runs the first fetch before returning.
    pub async fn observe(
        ctx: Arc<CacheContext>,
        address: &str,
        options: ObserveOptions,
    ) -> Self {
        let key = ResourceKey::build(address, &options.query);
        let instance = InstanceId::mint();

        let seed = if options.keep_previous_data {
            ctx.store().any_read_for_key(&key).await
        } else {
            None
        };
        let state = ReadState {
            is_loading: seed.is_none(),
            data: seed,
            error: None,
        };

        let observer = Self {
            inner: Arc::new(ObserverInner {
                ctx,
                instance,
                key,
                fetcher: options.fetcher,
                keep_previous_data: options.keep_previous_data,
                state: Arc::new(RwLock::new(state)),
                auto_started: AtomicBool::new(false),
            }),
        };
        observer.attach().await;
        observer
    }

    /// Re-attach this observer, as the surrounding UI does on re-render.
    ///
    /// Re-registers the latest closures and auto-starts the fetch exactly
    /// once while `data` remains empty; repeated attaches with unchanged
    /// data never refire.
    pub async fn attach(&self) {
        self.inner.register().await;

        let needs_data = self
            .inner
            .state
            .read()
            .map(|state| state.data.is_none())
            .unwrap_or(false);
        if needs_data && !self.inner.auto_started.swap(true, Ordering::SeqCst) {
            self.trigger().await;
        }
    }

    /// Fetch now, under epoch gating.
    pub async fn trigger(&self) {
        self.inner.run_trigger().await;
    }

    /// Snapshot the state cell.
    pub fn state(&self) -> SynclineResult<ReadState> {
        self.inner
            .state
            .read()
            .map(|state| state.clone())
            .map_err(|_| SynclineError::StatePoisoned)
    }

    /// This observer's instance identity.
    pub fn instance_id(&self) -> InstanceId {
        self.inner.instance
    }

    /// The canonical key being observed.
    pub fn key(&self) -> &ResourceKey {
        &self.inner.key
    }
}
