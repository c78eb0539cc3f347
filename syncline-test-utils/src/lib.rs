//! SYNCLINE Test Utilities
//!
//! Centralized test infrastructure for the SYNCLINE workspace:
//! - Mock fetchers and posters (re-exported from their source crate)
//! - Fixtures for common resource shapes
//! - Proptest generators for addresses and query parameters

// Re-export mock transports from their source crate
pub use syncline_cache::mock::{
    ControlledFetcher, ControlledPoster, FailingPoster, FlakyFetcher, ScriptedFetcher,
    ScriptedPoster, StaticFetcher,
};

// Re-export core types for convenience
pub use syncline_core::{
    InstanceId, OpKind, QueryParams, ResourceKey, SynclineError, SynclineResult,
};

use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// FIXTURES
// ============================================================================

/// A list-of-items payload: `["item-0", ..., "item-{n-1}"]`.
pub fn item_list(count: usize) -> Value {
    Value::Array((0..count).map(|i| json!(format!("item-{i}"))).collect())
}

/// A single item payload.
pub fn item(index: usize) -> Value {
    json!(format!("item-{index}"))
}

/// Append an item to a list payload, as an optimistic updater would.
pub fn appended(list: Option<&Value>, item: Value) -> Value {
    let mut entries = list
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    entries.push(item);
    Value::Array(entries)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Strategy for plausible resource addresses.
pub fn address_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z][a-z0-9-]{0,8}", 1..4)
        .prop_map(|segments| format!("/{}", segments.join("/")))
}

/// Strategy for arbitrary (possibly encoding-hostile) query components.
pub fn component_strategy() -> impl Strategy<Value = String> {
    "[ -~]{0,12}".prop_map(|s| s)
}

/// Strategy for ordered query parameter lists.
pub fn query_params_strategy() -> impl Strategy<Value = QueryParams> {
    proptest::collection::vec((component_strategy(), component_strategy()), 0..5)
        .prop_map(QueryParams::from_iter)
}
