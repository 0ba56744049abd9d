//! Audit log for claimdesk.
//!
//! Claim transitions are appended to `.claimdesk/events/events.ndjson`, one
//! JSON object per line. The log doubles as the out-of-band channel that
//! tells an operator their claim was revoked: force-release and lease expiry
//! events name the previous holder, and `claimdesk notices` reads them back.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: claim, release, force_release, lease_expired, status_change, ...
//! - `actor`: username of the operator who acted
//! - `resource`: `type/id` for resource-specific events
//! - `details`: freeform object with action-specific fields

use crate::error::{DeskError, Result};
use crate::resource::ResourceKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Actor recorded for transitions the system makes on its own.
pub const SYSTEM_ACTOR: &str = "system";

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Desk initialization
    Init,
    /// Resource added to a queue
    Add,
    /// Claim taken
    Claim,
    /// Claim released by its holder
    Release,
    /// Claim removed by a privileged operator
    ForceRelease,
    /// Claim removed because the holder stopped heartbeating
    LeaseExpired,
    /// Business status changed by the claim holder
    StatusChange,
}

impl EventAction {
    /// Whether the event took a claim away from someone other than the actor.
    pub fn is_revocation(&self) -> bool {
        matches!(self, EventAction::ForceRelease | EventAction::LeaseExpired)
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Init => write!(f, "init"),
            EventAction::Add => write!(f, "add"),
            EventAction::Claim => write!(f, "claim"),
            EventAction::Release => write!(f, "release"),
            EventAction::ForceRelease => write!(f, "force_release"),
            EventAction::LeaseExpired => write!(f, "lease_expired"),
            EventAction::StatusChange => write!(f, "status_change"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub action: EventAction,
    pub actor: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time.
    pub fn new(action: EventAction, actor: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor.into(),
            resource: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_resource(mut self, key: &ResourceKey) -> Self {
        self.resource = Some(key.to_string());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// The operator a revocation event was aimed at, if any.
    pub fn previous_holder(&self) -> Option<&str> {
        self.details.get("previous_holder").and_then(Value::as_str)
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| DeskError::UserError(format!("failed to serialize event to JSON: {}", e)))
    }
}

/// Append-only NDJSON event log.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line, creating the file if needed.
    pub fn append(&self, event: &Event) -> Result<()> {
        let json_line = event.to_ndjson_line()?;

        if let Some(dir) = self.path.parent()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| {
                DeskError::UserError(format!(
                    "failed to create events directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                DeskError::UserError(format!(
                    "failed to open events file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", json_line).map_err(|e| {
            DeskError::UserError(format!(
                "failed to write event to '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        file.sync_all().map_err(|e| {
            DeskError::UserError(format!(
                "failed to sync events file '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Read all events in order. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            DeskError::UserError(format!(
                "failed to read events file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Revocations aimed at `username`, newest first, at most `limit`.
    ///
    /// An operator force-releasing their own claim is not revoked.
    pub fn revocations_for(&self, username: &str, limit: usize) -> Result<Vec<Event>> {
        Ok(self
            .read_all()?
            .into_iter()
            .rev()
            .filter(|e| e.action.is_revocation() && e.previous_holder() == Some(username))
            .filter(|e| e.actor != username)
            .take(limit)
            .collect())
    }
}
