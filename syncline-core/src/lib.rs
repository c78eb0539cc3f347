//! SYNCLINE Core - Shared Types
//!
//! Pure data types with no behavior. All other crates depend on this.
//! This crate contains the identity, keying, and error types used by the
//! coordination engine - no coordination logic lives here.

pub mod error;
pub mod identity;
pub mod key;

pub use error::{SynclineError, SynclineResult};
pub use identity::{InstanceId, OpKind};
pub use key::{QueryParams, ResourceKey};
