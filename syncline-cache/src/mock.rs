//! Mock transports for testing.
//!
//! In-memory [`ResourceFetcher`]/[`ResourcePoster`] implementations with
//! scripted outcomes and call counting. Used by the workspace's own tests
//! and re-exported through `syncline-test-utils` for downstream crates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use syncline_core::{ResourceKey, SynclineError, SynclineResult};
use tokio::sync::{oneshot, Notify};

use crate::transport::{ResourceFetcher, ResourcePoster};

/// Fetcher that always returns the same value.
#[derive(Debug)]
pub struct StaticFetcher {
    value: Value,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetch calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for StaticFetcher {
    async fn fetch(&self, _key: &ResourceKey) -> SynclineResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

/// Fetcher that plays back a scripted sequence of outcomes.
///
/// Once the script is exhausted the last outcome repeats.
#[derive(Debug)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<SynclineResult<Value>>>,
    last: Mutex<Option<SynclineResult<Value>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<SynclineResult<Value>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetch calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, key: &ResourceKey) -> SynclineResult<Value> {
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            *self.last.lock().unwrap() = Some(outcome.clone());
            return outcome;
        }
        self.last
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(SynclineError::transport(key.as_str(), "script exhausted")))
    }
}

#[async_trait]
impl ResourceFetcher for ScriptedFetcher {
    async fn fetch(&self, key: &ResourceKey) -> SynclineResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next_outcome(key)
    }
}

/// Fetcher that fails a fixed number of times, then succeeds.
#[derive(Debug)]
pub struct FlakyFetcher {
    remaining_failures: AtomicUsize,
    value: Value,
    calls: AtomicUsize,
}

impl FlakyFetcher {
    pub fn new(failures: usize, value: Value) -> Self {
        Self {
            remaining_failures: AtomicUsize::new(failures),
            value,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetch calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for FlakyFetcher {
    async fn fetch(&self, key: &ResourceKey) -> SynclineResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if failing {
            Err(SynclineError::transport(key.as_str(), "flaky failure"))
        } else {
            Ok(self.value.clone())
        }
    }
}

/// Fetcher whose calls block until the test resolves them explicitly.
///
/// Each `fetch` parks on a oneshot channel; the test observes arrivals via
/// [`wait_for_pending`](Self::wait_for_pending) and completes them in any
/// order with [`resolve`](Self::resolve). This is how overlapping
/// operations with controlled completion order are driven.
pub struct ControlledFetcher {
    pending: Mutex<Vec<oneshot::Sender<SynclineResult<Value>>>>,
    arrived: Notify,
    calls: AtomicUsize,
}

impl ControlledFetcher {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            arrived: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetch calls so far (resolved or not).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls currently parked.
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Wait until at least `count` calls are parked.
    pub async fn wait_for_pending(&self, count: usize) {
        loop {
            if self.pending() >= count {
                return;
            }
            self.arrived.notified().await;
        }
    }

    /// Complete the parked call at `index` (in arrival order) with the
    /// given outcome. Later indices shift down. Returns false if no call
    /// is parked at that index.
    pub fn resolve(&self, index: usize, outcome: SynclineResult<Value>) -> bool {
        let mut pending = self.pending.lock().unwrap();
        if index >= pending.len() {
            return false;
        }
        let sender = pending.remove(index);
        sender.send(outcome).is_ok()
    }
}

impl Default for ControlledFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceFetcher for ControlledFetcher {
    async fn fetch(&self, key: &ResourceKey) -> SynclineResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().unwrap().push(sender);
        self.arrived.notify_waiters();
        receiver
            .await
            .unwrap_or_else(|_| Err(SynclineError::transport(key.as_str(), "fetch abandoned")))
    }
}

/// Poster whose calls block until the test resolves them explicitly.
///
/// The post-side counterpart of [`ControlledFetcher`], used to inspect
/// optimistic state while a post is still in flight.
pub struct ControlledPoster {
    pending: Mutex<Vec<oneshot::Sender<SynclineResult<Value>>>>,
    arrived: Notify,
    bodies: Mutex<Vec<Option<Value>>>,
    calls: AtomicUsize,
}

impl ControlledPoster {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            arrived: Notify::new(),
            bodies: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of post calls so far (resolved or not).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bodies received, in call order.
    pub fn bodies(&self) -> Vec<Option<Value>> {
        self.bodies.lock().unwrap().clone()
    }

    /// Wait until at least `count` calls are parked.
    pub async fn wait_for_pending(&self, count: usize) {
        loop {
            if self.pending.lock().unwrap().len() >= count {
                return;
            }
            self.arrived.notified().await;
        }
    }

    /// Complete the parked call at `index` (in arrival order).
    pub fn resolve(&self, index: usize, outcome: SynclineResult<Value>) -> bool {
        let mut pending = self.pending.lock().unwrap();
        if index >= pending.len() {
            return false;
        }
        let sender = pending.remove(index);
        sender.send(outcome).is_ok()
    }
}

impl Default for ControlledPoster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourcePoster for ControlledPoster {
    async fn post(&self, key: &ResourceKey, body: Option<&Value>) -> SynclineResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body.cloned());
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().unwrap().push(sender);
        self.arrived.notify_waiters();
        receiver
            .await
            .unwrap_or_else(|_| Err(SynclineError::transport(key.as_str(), "post abandoned")))
    }
}

/// Poster that plays back a scripted sequence of outcomes and records
/// request bodies.
///
/// Once the script is exhausted the last outcome repeats.
#[derive(Debug)]
pub struct ScriptedPoster {
    script: Mutex<VecDeque<SynclineResult<Value>>>,
    last: Mutex<Option<SynclineResult<Value>>>,
    bodies: Mutex<Vec<Option<Value>>>,
    calls: AtomicUsize,
}

impl ScriptedPoster {
    pub fn new(script: Vec<SynclineResult<Value>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            bodies: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of post calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bodies received, in call order.
    pub fn bodies(&self) -> Vec<Option<Value>> {
        self.bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourcePoster for ScriptedPoster {
    async fn post(&self, key: &ResourceKey, body: Option<&Value>) -> SynclineResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body.cloned());
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            *self.last.lock().unwrap() = Some(outcome.clone());
            return outcome;
        }
        self.last
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(SynclineError::transport(key.as_str(), "script exhausted")))
    }
}

/// Poster that always fails.
#[derive(Debug)]
pub struct FailingPoster {
    reason: String,
    calls: AtomicUsize,
}

impl FailingPoster {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of post calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourcePoster for FailingPoster {
    async fn post(&self, key: &ResourceKey, _body: Option<&Value>) -> SynclineResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SynclineError::transport(key.as_str(), self.reason.clone()))
    }
}
