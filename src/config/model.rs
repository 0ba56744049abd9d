//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for a claim desk.
///
/// This struct represents the contents of `.claimdesk/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Polling
    // =========================================================================
    /// Interval between queue refreshes in `watch`. This is also the
    /// staleness bound operators should expect for claim state.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    // =========================================================================
    // Roles
    // =========================================================================
    /// Operators holding the elevated role (may force-release).
    #[serde(default)]
    pub privileged_operators: Vec<String>,

    // =========================================================================
    // Claims
    // =========================================================================
    /// Minutes after which a claim is flagged as possibly abandoned in listings.
    #[serde(default = "default_claim_stale_minutes")]
    pub claim_stale_minutes: u32,

    /// Heartbeat lease settings.
    #[serde(default)]
    pub lease: LeaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            privileged_operators: Vec::new(),
            claim_stale_minutes: default_claim_stale_minutes(),
            lease: LeaseConfig::default(),
        }
    }
}
