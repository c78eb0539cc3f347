//! Identity types for SYNCLINE instances and operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identity of one observer or mutator instance.
///
/// Minted once per instance lifetime and never reused. Every per-instance
/// map in the engine (epoch ledgers, cache store, registrations) is keyed
/// by `InstanceId` first, so two instances observing the same resource can
/// never interfere with each other's counters or stored values.
///
/// Uses UUIDv7 so instance ids are timestamp-sortable, matching the id
/// convention used across the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Mint a fresh instance id.
    pub fn mint() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID as an instance id.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which epoch ledger an operation belongs to.
///
/// Reads and writes keep independent counters for the same instance+key,
/// so an in-flight fetch is never invalidated by a mutation epoch and
/// vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    /// Fetch operations (observer triggers).
    Read,
    /// Mutation operations (mutator posts).
    Write,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}
