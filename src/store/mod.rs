//! Lock Record Store: durable mapping of `(resource_type, resource_id)` to at
//! most one active claim.
//!
//! # Contract
//!
//! Every operation is atomic with respect to the claim state machine:
//! - `try_claim` succeeds only when no record exists; otherwise it reports the
//!   current holder. The first writer wins; the loser never overwrites.
//! - `release` removes the record only when the caller is the holder.
//! - `force_release` removes any record and is idempotent.
//! - `while_held` runs an action with the holder pinned for its duration.
//!
//! Claims carry no expiry of their own. Lease expiry, when enabled, is driven
//! from outside through `heartbeat` and `expire`.
//!
//! # Implementations
//!
//! - [`MemoryLockStore`]: a mutex-guarded map, for embedding and tests.
//! - [`FileLockStore`]: one JSON lock file per claim, created with exclusive
//!   create semantics so separate processes share one truth.

mod file;
mod guard;
mod memory;
mod record;

#[cfg(test)]
mod tests;

use crate::error::Result;
use crate::resource::{ResourceKey, ResourceType};
use chrono::{DateTime, Utc};

pub use file::FileLockStore;
pub use memory::MemoryLockStore;
pub use record::ClaimRecord;

/// Outcome of an exclusive claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryClaim {
    /// The record was written; the caller now holds the claim.
    Acquired(ClaimRecord),
    /// Someone already holds the claim; nothing was written.
    Conflict(ClaimRecord),
}

/// Outcome of a holder release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// The caller's record was removed.
    Released(ClaimRecord),
    /// The caller is not the holder. Carries the current holder, if any.
    NotHolder(Option<ClaimRecord>),
}

/// Outcome of an action run under a held claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Held {
    /// The caller held the claim and the action ran.
    Ran(ClaimRecord),
    /// The caller is not the holder; the action did not run.
    NotHolder(Option<ClaimRecord>),
}

/// Storage contract for claims.
pub trait LockStore: Send + Sync {
    /// Write `claim` for `key` only if no claim exists.
    fn try_claim(&self, key: &ResourceKey, claim: ClaimRecord) -> Result<TryClaim>;

    /// Remove the claim for `key` if `operator_id` holds it.
    fn release(&self, key: &ResourceKey, operator_id: &str) -> Result<Release>;

    /// Remove any claim for `key`, returning the previous holder.
    fn force_release(&self, key: &ResourceKey) -> Result<Option<ClaimRecord>>;

    /// Run `action` only while `operator_id` holds `key`.
    ///
    /// No release, force-release or expiry can interleave with the holder
    /// check and the action. With `release_after`, the claim is removed in
    /// the same critical section once the action succeeds.
    fn while_held(
        &self,
        key: &ResourceKey,
        operator_id: &str,
        release_after: bool,
        action: &mut dyn FnMut() -> Result<()>,
    ) -> Result<Held>;

    /// Current claim for `key`.
    fn read(&self, key: &ResourceKey) -> Result<Option<ClaimRecord>>;

    /// All active claims, optionally restricted to one resource type, ordered by key.
    fn list(&self, resource_type: Option<ResourceType>) -> Result<Vec<(ResourceKey, ClaimRecord)>>;

    /// Stamp `heartbeat_at = now` on every claim held by `operator_id`.
    /// Returns the number of claims renewed.
    fn heartbeat(&self, operator_id: &str, now: DateTime<Utc>) -> Result<usize>;

    /// Remove the claim for `key` if its heartbeat is older than `stale_before`.
    fn expire(&self, key: &ResourceKey, stale_before: DateTime<Utc>)
    -> Result<Option<ClaimRecord>>;
}
