//! In-process lock store.

use super::{ClaimRecord, Held, LockStore, Release, TryClaim};
use crate::error::Result;
use crate::resource::{ResourceKey, ResourceType};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{Mutex, MutexGuard};

/// Lock store held in memory behind one mutex.
///
/// Every operation runs under the same mutex, which makes each of them
/// atomic with respect to the others.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    claims: Mutex<BTreeMap<ResourceKey, ClaimRecord>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn claims(&self) -> MutexGuard<'_, BTreeMap<ResourceKey, ClaimRecord>> {
        self.claims.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl LockStore for MemoryLockStore {
    fn try_claim(&self, key: &ResourceKey, claim: ClaimRecord) -> Result<TryClaim> {
        match self.claims().entry(key.clone()) {
            Entry::Occupied(existing) => Ok(TryClaim::Conflict(existing.get().clone())),
            Entry::Vacant(slot) => Ok(TryClaim::Acquired(slot.insert(claim).clone())),
        }
    }

    fn release(&self, key: &ResourceKey, operator_id: &str) -> Result<Release> {
        let mut claims = self.claims();
        match claims.get(key) {
            Some(record) if record.is_held_by(operator_id) => {
                let record = claims.remove(key);
                Ok(record.map_or(Release::NotHolder(None), Release::Released))
            }
            other => Ok(Release::NotHolder(other.cloned())),
        }
    }

    fn force_release(&self, key: &ResourceKey) -> Result<Option<ClaimRecord>> {
        Ok(self.claims().remove(key))
    }

    fn while_held(
        &self,
        key: &ResourceKey,
        operator_id: &str,
        release_after: bool,
        action: &mut dyn FnMut() -> Result<()>,
    ) -> Result<Held> {
        let mut claims = self.claims();
        let record = match claims.get(key) {
            Some(record) if record.is_held_by(operator_id) => record.clone(),
            other => return Ok(Held::NotHolder(other.cloned())),
        };

        action()?;
        if release_after {
            claims.remove(key);
        }
        Ok(Held::Ran(record))
    }

    fn read(&self, key: &ResourceKey) -> Result<Option<ClaimRecord>> {
        Ok(self.claims().get(key).cloned())
    }

    fn list(&self, resource_type: Option<ResourceType>) -> Result<Vec<(ResourceKey, ClaimRecord)>> {
        Ok(self
            .claims()
            .iter()
            .filter(|(key, _)| resource_type.is_none_or(|t| key.resource_type == t))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect())
    }

    fn heartbeat(&self, operator_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let mut renewed = 0;
        for record in self.claims().values_mut() {
            if record.is_held_by(operator_id) {
                record.heartbeat_at = now;
                renewed += 1;
            }
        }
        Ok(renewed)
    }

    fn expire(
        &self,
        key: &ResourceKey,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<ClaimRecord>> {
        let mut claims = self.claims();
        match claims.get(key) {
            Some(record) if record.heartbeat_before(stale_before) => Ok(claims.remove(key)),
            _ => Ok(None),
        }
    }
}
