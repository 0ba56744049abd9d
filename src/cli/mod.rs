//! CLI argument parsing for claimdesk.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use crate::resource::{ResourceStatus, ResourceType};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Claimdesk: claim/lock coordination for a shared queue of requests.
///
/// Operators take exclusive claims on top-up, transfer and share requests
/// before changing them:
/// - at most one operator holds a request at a time
/// - privileged operators can force-release stuck claims
/// - `watch` polls the queue and reports claims taken away
#[derive(Parser, Debug)]
#[command(name = "claimdesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Project root containing `.claimdesk/` (defaults to CLAIMDESK_ROOT,
    /// then the nearest ancestor of the current directory with a desk).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Operator name (defaults to CLAIMDESK_OPERATOR, then the login user).
    #[arg(long, global = true)]
    pub operator: Option<String>,
}

/// Available commands for claimdesk.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a desk in the current directory (or --root).
    ///
    /// Creates `.claimdesk/` with the config file, resource queues, lock
    /// directory and audit log.
    Init,

    /// Add a request to a queue.
    Add(AddArgs),

    /// List a queue with claim holders and your permitted actions.
    List(ListArgs),

    /// Claim a request so you can work on it.
    ///
    /// Fails with a conflict if another operator already holds it.
    Claim(TargetArgs),

    /// Release a request you have claimed.
    Release(TargetArgs),

    /// Remove another operator's claim (privileged operators only).
    ///
    /// The previous holder sees the revocation in `watch` and `notices`.
    ForceRelease(TargetArgs),

    /// Change the status of a request you have claimed.
    ///
    /// A closing status (verified, rejected, completed, cancelled) also
    /// releases the claim.
    SetStatus(SetStatusArgs),

    /// Poll a queue and report claims taken away from you.
    Watch(WatchArgs),

    /// Lock management commands.
    ///
    /// List active claims or expire abandoned ones.
    Lock(LockCommand),

    /// Show revocations and lease expiries of your claims.
    Notices(NoticesArgs),
}

/// Arguments for the `add` command.
#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Resource type (topup, transfer, share).
    #[arg(value_parser = parse_resource_type)]
    pub resource_type: ResourceType,

    /// Resource ID, unique within its type.
    pub resource_id: String,

    /// Initial status.
    #[arg(long, value_parser = parse_status, default_value = "pending")]
    pub status: ResourceStatus,

    /// Business fields carried with the request (repeatable).
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Resource type (topup, transfer, share).
    #[arg(value_parser = parse_resource_type)]
    pub resource_type: ResourceType,
}

/// A single request, addressed by type and ID.
#[derive(Parser, Debug)]
pub struct TargetArgs {
    /// Resource type (topup, transfer, share).
    #[arg(value_parser = parse_resource_type)]
    pub resource_type: ResourceType,

    /// Resource ID.
    pub resource_id: String,
}

/// Arguments for the `set-status` command.
#[derive(Parser, Debug)]
pub struct SetStatusArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// New status.
    #[arg(value_parser = parse_status)]
    pub status: ResourceStatus,
}

/// Arguments for the `watch` command.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Resource type (topup, transfer, share).
    #[arg(value_parser = parse_resource_type)]
    pub resource_type: ResourceType,

    /// Poll interval in milliseconds (defaults to config `poll_interval_ms`).
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Run a single poll and exit.
    #[arg(long)]
    pub once: bool,
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// List all active claims.
    ///
    /// Shows each claim's holder, host and age, flagging stale ones.
    List,

    /// Expire claims whose holder stopped polling.
    ///
    /// Only has an effect when `lease.enabled` is set in the config.
    Sweep,
}

/// Arguments for the `notices` command.
#[derive(Parser, Debug)]
pub struct NoticesArgs {
    /// Show at most this many notices, newest first.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

fn parse_resource_type(s: &str) -> Result<ResourceType, String> {
    ResourceType::parse(s).map_err(|e| e.to_string())
}

fn parse_status(s: &str) -> Result<ResourceStatus, String> {
    ResourceStatus::parse(s).map_err(|e| e.to_string())
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
