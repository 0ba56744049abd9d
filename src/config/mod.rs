//! Configuration model for claimdesk.
//!
//! This module defines the Config struct that represents `.claimdesk/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, and validation of config values.

mod model;
mod operations;
pub mod types;


pub use model::Config;
pub use types::LeaseConfig;
