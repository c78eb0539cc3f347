//! Error types for SYNCLINE operations.
//!
//! The taxonomy is deliberately small. A failed transport call is the only
//! error surfaced to callers (as the `error` field of observer/mutator
//! state). Stale operations and broadcasts to keys with no subscribers are
//! silent no-ops by design, not errors.

use thiserror::Error;

/// Errors surfaced by the coordination engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynclineError {
    /// The injected fetch or post function failed.
    #[error("Transport failure for {key}: {reason}")]
    Transport { key: String, reason: String },

    /// A per-instance state cell was poisoned by a panicking holder.
    ///
    /// Scoped to the one instance that owns the cell; propagation and
    /// rollback to other instances are unaffected.
    #[error("State cell poisoned")]
    StatePoisoned,
}

impl SynclineError {
    /// Build a transport failure for the given key.
    pub fn transport(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the workspace.
pub type SynclineResult<T> = Result<T, SynclineError>;
