//! Claim Coordinator: the protocol engine.
//!
//! Validates and executes claim transitions against the lock store. Per
//! resource the state machine is:
//!
//! ```text
//!            claim(op)                    release(op) / force_release
//! Unclaimed ──────────► ClaimedBy(op) ──────────────────────────────► Unclaimed
//! ```
//!
//! A terminal business status freezes a resource out of the machine: it can
//! no longer be claimed, and the status change that terminalizes it clears
//! any claim in the same call.
//!
//! A lost claim race is reported as [`ClaimOutcome::Conflict`], an ordinary
//! value. It is the expected result of two operators reaching for the same
//! item and is not logged as a failure.
//!
//! The coordinator also serves the listing used by polling clients, and the
//! mutate path, which re-checks claim ownership on this side instead of
//! trusting the client's gate.

#[cfg(test)]
mod tests;

use crate::config::LeaseConfig;
use crate::error::{DeskError, Result};
use crate::events::{Event, EventAction, EventLog, SYSTEM_ACTOR};
use crate::operator::OperatorContext;
use crate::resource::{
    ClaimableResource, ResourceKey, ResourceRecord, ResourceRepository, ResourceStatus,
    ResourceType,
};
use crate::store::{ClaimRecord, Held, LockStore, Release, TryClaim};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a claim attempt that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller now holds the claim.
    Claimed(ClaimRecord),
    /// Someone else got there first. Nothing changed.
    Conflict {
        holder: ClaimRecord,
        /// Operator-facing explanation.
        detail: String,
    },
}

/// Single writer of claim state.
pub struct ClaimCoordinator {
    store: Arc<dyn LockStore>,
    resources: Arc<dyn ResourceRepository>,
    events: Option<EventLog>,
    lease: LeaseConfig,
}

impl ClaimCoordinator {
    pub fn new(store: Arc<dyn LockStore>, resources: Arc<dyn ResourceRepository>) -> Self {
        Self {
            store,
            resources,
            events: None,
            lease: LeaseConfig::default(),
        }
    }

    /// Record transitions in an audit log.
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Enable heartbeat leases.
    pub fn with_lease(mut self, lease: LeaseConfig) -> Self {
        self.lease = lease;
        self
    }

    /// Add a new resource to its queue.
    pub fn add_resource(&self, record: ResourceRecord, actor: &OperatorContext) -> Result<()> {
        let key = record.key();
        let status = record.status;
        self.resources.insert(record)?;

        tracing::info!(resource = %key, operator = %actor.username, "resource added");
        self.record(
            Event::new(EventAction::Add, &actor.username)
                .with_resource(&key)
                .with_details(json!({ "status": status })),
        );
        Ok(())
    }

    /// Take the claim on `key` for `operator`.
    ///
    /// Valid only while the resource is unclaimed and non-terminal. A claim
    /// already held, by anyone including the caller, yields
    /// [`ClaimOutcome::Conflict`].
    pub fn claim(&self, key: &ResourceKey, operator: &OperatorContext) -> Result<ClaimOutcome> {
        let record = self.require_resource(key)?;
        if record.status.is_terminal() {
            return Err(terminal(key, record.status));
        }

        let claim = ClaimRecord::for_operator(operator, Utc::now());
        match self.store.try_claim(key, claim)? {
            TryClaim::Conflict(holder) => {
                tracing::debug!(
                    resource = %key,
                    operator = %operator.username,
                    holder = %holder.username,
                    "claim lost to current holder"
                );
                let detail = conflict_detail(&holder, operator);
                Ok(ClaimOutcome::Conflict { holder, detail })
            }
            TryClaim::Acquired(claim) => {
                // The resource may have been closed between the status check
                // and the store write; closed resources are never locked.
                let current = self.require_resource(key)?;
                if current.status.is_terminal() {
                    self.store.release(key, &operator.id)?;
                    return Err(terminal(key, current.status));
                }

                tracing::info!(resource = %key, operator = %operator.username, "claim acquired");
                self.record(
                    Event::new(EventAction::Claim, &operator.username)
                        .with_resource(key)
                        .with_details(json!({ "operator_id": claim.operator_id })),
                );
                Ok(ClaimOutcome::Claimed(claim))
            }
        }
    }

    /// Give up a claim held by `operator`.
    ///
    /// Fails with `Unauthorized` unless the caller is the current holder.
    pub fn release(&self, key: &ResourceKey, operator: &OperatorContext) -> Result<ClaimRecord> {
        match self.store.release(key, &operator.id)? {
            Release::Released(record) => {
                tracing::info!(resource = %key, operator = %operator.username, "claim released");
                self.record(Event::new(EventAction::Release, &operator.username).with_resource(key));
                Ok(record)
            }
            Release::NotHolder(Some(holder)) => Err(DeskError::Unauthorized(format!(
                "not your claim: {} is held by {}",
                key, holder.username
            ))),
            Release::NotHolder(None) => Err(DeskError::Unauthorized(format!(
                "not your claim: {} is not claimed",
                key
            ))),
        }
    }

    /// Remove whatever claim exists on `key`. Privileged callers only.
    ///
    /// Idempotent: an unclaimed resource stays unclaimed and the call still
    /// succeeds. Returns the previous holder, who is notified through a
    /// `force_release` audit event naming them.
    pub fn force_release(
        &self,
        key: &ResourceKey,
        operator: &OperatorContext,
    ) -> Result<Option<ClaimRecord>> {
        if !operator.is_privileged {
            return Err(DeskError::Unauthorized(format!(
                "requires elevated role to force-release {}",
                key
            )));
        }

        let previous = self.store.force_release(key)?;
        match &previous {
            Some(holder) => {
                tracing::warn!(
                    resource = %key,
                    operator = %operator.username,
                    previous_holder = %holder.username,
                    "claim force-released"
                );
                self.record(
                    Event::new(EventAction::ForceRelease, &operator.username)
                        .with_resource(key)
                        .with_details(json!({
                            "previous_holder": holder.username,
                            "previous_holder_id": holder.operator_id,
                            "claimed_at": holder.claimed_at,
                        })),
                );
            }
            None => {
                tracing::debug!(resource = %key, "force-release on unclaimed resource");
            }
        }
        Ok(previous)
    }

    /// Change the business status of `key`.
    ///
    /// The holder check and the write run as one step in the lock store, so a
    /// concurrent force-release either lands first and refuses the write or
    /// waits for it. A terminal status also clears the claim.
    pub fn apply_status(
        &self,
        key: &ResourceKey,
        operator: &OperatorContext,
        status: ResourceStatus,
    ) -> Result<ResourceRecord> {
        let record = self.require_resource(key)?;
        if record.status.is_terminal() {
            return Err(terminal(key, record.status));
        }

        let previous_status = record.status;
        let mut updated = None;
        let held = self.store.while_held(key, &operator.id, status.is_terminal(), &mut || {
            updated = Some(self.resources.set_status(key, status, Utc::now())?);
            Ok(())
        })?;

        let updated = match (held, updated) {
            (Held::Ran(_), Some(updated)) => updated,
            (Held::Ran(_), None) => {
                return Err(DeskError::StoreError(format!(
                    "status of {} was not written",
                    key
                )));
            }
            (Held::NotHolder(Some(holder)), _) => {
                return Err(DeskError::Unauthorized(format!(
                    "not your claim: {} is held by {}",
                    key, holder.username
                )));
            }
            (Held::NotHolder(None), _) => {
                return Err(DeskError::Unauthorized(format!(
                    "claim first: {} must be claimed before changing its status",
                    key
                )));
            }
        };

        tracing::info!(
            resource = %key,
            operator = %operator.username,
            from = %previous_status,
            to = %status,
            "status changed"
        );
        self.record(
            Event::new(EventAction::StatusChange, &operator.username)
                .with_resource(key)
                .with_details(json!({
                    "from": previous_status,
                    "to": status,
                    "claim_cleared": status.is_terminal(),
                })),
        );
        Ok(updated)
    }

    /// Listing endpoint: every resource of `resource_type` with its claim
    /// fields embedded.
    ///
    /// When leases are enabled, a listing by `caller` renews the caller's
    /// claims. A failed heartbeat is logged and does not fail the listing.
    pub fn snapshot(
        &self,
        resource_type: ResourceType,
        caller: Option<&OperatorContext>,
    ) -> Result<Vec<ClaimableResource>> {
        if self.lease.enabled
            && let Some(op) = caller
            && let Err(e) = self.store.heartbeat(&op.id, Utc::now())
        {
            tracing::warn!(operator = %op.username, "heartbeat failed: {}", e);
        }

        let claims: HashMap<String, ClaimRecord> = self
            .store
            .list(Some(resource_type))?
            .into_iter()
            .map(|(key, record)| (key.resource_id, record))
            .collect();

        Ok(self
            .resources
            .list(resource_type)?
            .into_iter()
            .map(|record| {
                let claim = claims.get(&record.resource_id);
                record.into_claimable(claim)
            })
            .collect())
    }

    /// A single resource with its claim fields embedded.
    pub fn get(&self, key: &ResourceKey) -> Result<ClaimableResource> {
        let record = self.require_resource(key)?;
        let claim = self.store.read(key)?;
        Ok(record.into_claimable(claim.as_ref()))
    }

    /// All active claims, optionally for one resource type.
    pub fn claims(
        &self,
        resource_type: Option<ResourceType>,
    ) -> Result<Vec<(ResourceKey, ClaimRecord)>> {
        self.store.list(resource_type)
    }

    /// Expire claims whose holder has stopped heartbeating.
    ///
    /// Does nothing unless leases are enabled. Expired claims go the same way
    /// as a force-release: removed, with an audit event naming the holder.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<(ResourceKey, ClaimRecord)>> {
        if !self.lease.enabled {
            return Ok(Vec::new());
        }

        let cutoff = now - self.lease.ttl();
        let mut expired = Vec::new();

        for (key, record) in self.store.list(None)? {
            if !record.heartbeat_before(cutoff) {
                continue;
            }
            // Re-checked under the store's own atomicity; the holder may have
            // heartbeated since the listing.
            if let Some(previous) = self.store.expire(&key, cutoff)? {
                tracing::warn!(
                    resource = %key,
                    previous_holder = %previous.username,
                    "claim lease expired"
                );
                self.record(
                    Event::new(EventAction::LeaseExpired, SYSTEM_ACTOR)
                        .with_resource(&key)
                        .with_details(json!({
                            "previous_holder": previous.username,
                            "previous_holder_id": previous.operator_id,
                            "last_heartbeat": previous.heartbeat_at,
                        })),
                );
                expired.push((key, previous));
            }
        }

        Ok(expired)
    }

    fn require_resource(&self, key: &ResourceKey) -> Result<ResourceRecord> {
        self.resources
            .get(key)?
            .ok_or_else(|| DeskError::NotFound(key.to_string()))
    }

    /// Append to the audit log. The transition has already happened, so a
    /// logging failure is reported but does not fail the call.
    fn record(&self, event: Event) {
        if let Some(events) = &self.events
            && let Err(e) = events.append(&event)
        {
            tracing::warn!("failed to log {} event: {}", event.action, e);
        }
    }
}

fn terminal(key: &ResourceKey, status: ResourceStatus) -> DeskError {
    DeskError::Terminal(format!("{} is {}", key, status))
}

fn conflict_detail(holder: &ClaimRecord, caller: &OperatorContext) -> String {
    if holder.is_held_by(&caller.id) {
        "You have already claimed this request".to_string()
    } else {
        format!(
            "This request is already being processed by {}",
            holder.username
        )
    }
}
