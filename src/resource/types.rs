//! Resource identity, lifecycle status, and the claim-embedding snapshot type.

use crate::error::{DeskError, Result};
use crate::store::ClaimRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum length of a resource ID.
const MAX_RESOURCE_ID_LEN: usize = 64;

/// Logical queue a resource belongs to. Distinct queues share no locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Balance top-up requests.
    Topup,
    /// Outbound transfer requests.
    Transfer,
    /// Share purchase/transfer requests.
    Share,
}

/// All resource types, in display order.
pub const RESOURCE_TYPES: &[ResourceType] =
    &[ResourceType::Topup, ResourceType::Transfer, ResourceType::Share];

impl ResourceType {
    /// Stable lowercase name, also used as the on-disk directory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Topup => "topup",
            ResourceType::Transfer => "transfer",
            ResourceType::Share => "share",
        }
    }

    /// Parse a resource type from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "topup" | "top-up" | "top_up" => Some(Self::Topup),
            "transfer" => Some(Self::Transfer),
            "share" => Some(Self::Share),
            _ => None,
        }
    }

    /// Parse a resource type, producing a user error listing the valid names.
    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| {
            DeskError::UserError(format!(
                "unknown resource type '{}'. Expected one of: {}",
                s,
                RESOURCE_TYPES
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business lifecycle state of a resource.
///
/// The protocol only cares whether a status is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    #[default]
    Pending,
    ProofUploaded,
    Processing,
    Verified,
    Rejected,
    Completed,
    Cancelled,
}

impl ResourceStatus {
    /// Terminal statuses freeze a resource out of the claim state machine.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResourceStatus::Verified
                | ResourceStatus::Rejected
                | ResourceStatus::Completed
                | ResourceStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::ProofUploaded => "proof_uploaded",
            ResourceStatus::Processing => "processing",
            ResourceStatus::Verified => "verified",
            ResourceStatus::Rejected => "rejected",
            ResourceStatus::Completed => "completed",
            ResourceStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "proof_uploaded" => Some(Self::ProofUploaded),
            "processing" => Some(Self::Processing),
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| {
            DeskError::UserError(format!(
                "unknown status '{}'. Expected one of: pending, proof_uploaded, processing, \
                 verified, rejected, completed, cancelled",
                s
            ))
        })
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock key: `(resource_type, resource_id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl ResourceKey {
    /// Build a key, validating the ID.
    pub fn new(resource_type: ResourceType, resource_id: &str) -> Result<Self> {
        Ok(Self {
            resource_type,
            resource_id: validate_resource_id(resource_id)?,
        })
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.resource_id)
    }
}

/// Validate a resource ID.
///
/// IDs become file names in the file-backed stores, so only
/// `[A-Za-z0-9_-]` is accepted and path traversal is impossible.
pub fn validate_resource_id(resource_id: &str) -> Result<String> {
    if resource_id.is_empty() || resource_id.len() > MAX_RESOURCE_ID_LEN {
        return Err(DeskError::UserError(format!(
            "invalid resource ID '{}': must be 1-{} characters",
            resource_id, MAX_RESOURCE_ID_LEN
        )));
    }

    if !resource_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DeskError::UserError(format!(
            "invalid resource ID '{}': only letters, digits, '-' and '_' are allowed",
            resource_id
        )));
    }

    Ok(resource_id.to_string())
}

/// Durable business record of a resource, without claim state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub resource_type: ResourceType,
    pub resource_id: String,

    #[serde(default)]
    pub status: ResourceStatus,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Business fields, carried but never interpreted.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ResourceRecord {
    pub fn new(key: ResourceKey, status: ResourceStatus) -> Self {
        Self {
            resource_type: key.resource_type,
            resource_id: key.resource_id,
            status,
            created_at: Utc::now(),
            updated_at: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            resource_type: self.resource_type,
            resource_id: self.resource_id.clone(),
        }
    }

    /// Merge this record with the store's claim state into a listing snapshot.
    pub fn into_claimable(self, claim: Option<&ClaimRecord>) -> ClaimableResource {
        let resource = ClaimableResource {
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            status: self.status,
            claimed_by: None,
            claimed_by_username: None,
            claimed_at: None,
            extra: self.extra,
        };

        match claim {
            // Terminal items are never shown as locked.
            Some(record) if !resource.status.is_terminal() => resource.with_claim(record),
            _ => resource,
        }
    }
}

/// A queue item as seen by clients: business status plus embedded claim fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimableResource {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub status: ResourceStatus,

    #[serde(default)]
    pub claimed_by: Option<String>,

    /// Display name mirrored from `claimed_by`; `Some` iff `claimed_by` is `Some`.
    #[serde(default)]
    pub claimed_by_username: Option<String>,

    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ClaimableResource {
    /// An unclaimed resource with no business fields.
    pub fn new(resource_type: ResourceType, resource_id: &str, status: ResourceStatus) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.to_string(),
            status,
            claimed_by: None,
            claimed_by_username: None,
            claimed_at: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            resource_type: self.resource_type,
            resource_id: self.resource_id.clone(),
        }
    }

    /// Set all three claim fields together from a claim record.
    pub fn with_claim(mut self, record: &ClaimRecord) -> Self {
        self.claimed_by = Some(record.operator_id.clone());
        self.claimed_by_username = Some(record.username.clone());
        self.claimed_at = Some(record.claimed_at);
        self
    }

    /// Clear all three claim fields together.
    pub fn without_claim(mut self) -> Self {
        self.claimed_by = None;
        self.claimed_by_username = None;
        self.claimed_at = None;
        self
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
