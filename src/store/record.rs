//! Claim records stored by the lock store.

use crate::error::{DeskError, Result};
use crate::operator::OperatorContext;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One active claim: which operator holds a resource and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Holder's operator ID (`claimed_by`).
    pub operator_id: String,

    /// Holder's display name (`claimed_by_username`).
    pub username: String,

    /// When the claim was taken.
    pub claimed_at: DateTime<Utc>,

    /// Last time the holder was seen polling. Only consulted when leases are on.
    pub heartbeat_at: DateTime<Utc>,

    /// Host the claim was taken from, for diagnosing abandoned claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ClaimRecord {
    pub fn new(operator_id: &str, username: &str, now: DateTime<Utc>) -> Self {
        Self {
            operator_id: operator_id.to_string(),
            username: username.to_string(),
            claimed_at: now,
            heartbeat_at: now,
            host: None,
        }
    }

    /// A record for `operator` stamped with the local host name.
    pub fn for_operator(operator: &OperatorContext, now: DateTime<Utc>) -> Self {
        let mut record = Self::new(&operator.id, &operator.username, now);
        record.host = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string());
        record
    }

    pub fn is_held_by(&self, operator_id: &str) -> bool {
        self.operator_id == operator_id
    }

    /// How long the claim has been held.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.claimed_at)
    }

    /// Whether the holder's last heartbeat is older than `stale_before`.
    pub fn heartbeat_before(&self, stale_before: DateTime<Utc>) -> bool {
        self.heartbeat_at < stale_before
    }

    pub(crate) fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DeskError::StoreError(format!(
                "failed to read lock file '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            DeskError::StoreError(format!(
                "failed to parse lock file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub(crate) fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DeskError::StoreError(format!("failed to serialize claim record: {}", e)))
    }
}
