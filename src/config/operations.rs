//! Config loading and validation.

use super::model::Config;
use crate::error::{DeskError, Result};
use std::path::Path;

/// Intervals below this would turn polling into a busy loop.
const MIN_POLL_INTERVAL_MS: u64 = 50;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            DeskError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config, falling back to defaults when the file does not exist.
    ///
    /// A file that exists but fails to parse or validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| DeskError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| DeskError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - `poll_interval_ms` must be at least 50
    /// - `claim_stale_minutes` must be positive
    /// - `lease.heartbeat_seconds` and `lease.missed_heartbeats` must be positive
    /// - `privileged_operators` entries must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(DeskError::UserError(format!(
                "config validation failed: poll_interval_ms must be at least {}",
                MIN_POLL_INTERVAL_MS
            )));
        }

        if self.claim_stale_minutes == 0 {
            return Err(DeskError::UserError(
                "config validation failed: claim_stale_minutes must be greater than 0".to_string(),
            ));
        }

        if self.lease.heartbeat_seconds == 0 {
            return Err(DeskError::UserError(
                "config validation failed: lease.heartbeat_seconds must be greater than 0"
                    .to_string(),
            ));
        }

        if self.lease.missed_heartbeats == 0 {
            return Err(DeskError::UserError(
                "config validation failed: lease.missed_heartbeats must be greater than 0"
                    .to_string(),
            ));
        }

        if self.privileged_operators.iter().any(|p| p.trim().is_empty()) {
            return Err(DeskError::UserError(
                "config validation failed: privileged_operators entries must be non-empty"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}
