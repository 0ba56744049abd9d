//! Configuration types and defaults for claimdesk.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Upper bound keeping the TTL within chrono's `Duration` range (about 100 years).
const MAX_LEASE_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Optional heartbeat lease on claims.
///
/// Claims never expire on their own. With a lease enabled, every listing
/// request by an operator counts as a heartbeat for that operator's claims,
/// and `lock sweep` expires claims whose holder has missed
/// `missed_heartbeats` consecutive heartbeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Whether claims are subject to lease expiry.
    pub enabled: bool,

    /// Expected seconds between heartbeats (normally the poll interval).
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,

    /// Heartbeats a holder may miss before the claim expires.
    #[serde(default = "default_missed_heartbeats")]
    pub missed_heartbeats: u32,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            heartbeat_seconds: default_heartbeat_seconds(),
            missed_heartbeats: default_missed_heartbeats(),
        }
    }
}

impl LeaseConfig {
    /// How long a claim survives without a heartbeat.
    pub fn ttl(&self) -> Duration {
        let secs = self
            .heartbeat_seconds
            .saturating_mul(u64::from(self.missed_heartbeats))
            .min(MAX_LEASE_SECONDS);
        Duration::seconds(secs as i64)
    }
}

// Default value functions for serde
pub(crate) fn default_poll_interval_ms() -> u64 {
    10_000
}
pub(crate) fn default_claim_stale_minutes() -> u32 {
    120
}
pub(crate) fn default_heartbeat_seconds() -> u64 {
    10
}
pub(crate) fn default_missed_heartbeats() -> u32 {
    6
}
