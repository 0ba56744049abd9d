//! Implementation of the `claimdesk init` command.
//!
//! Creates the desk directory structure:
//!
//! ```text
//! .claimdesk/
//!   config.yaml
//!   resources/{topup,transfer,share}/
//!   locks/
//!   events/events.ndjson
//! ```
//!
//! Idempotent: running it again fills in anything missing and never
//! overwrites an existing config.

use crate::cli::GlobalArgs;
use crate::config::Config;
use crate::context::DeskContext;
use crate::error::{DeskError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::fs::atomic_write_file;
use crate::operator::OperatorContext;
use crate::resource::RESOURCE_TYPES;
use serde_json::json;
use std::fs;
use std::path::Path;

const CONFIG_HEADER: &str = "\
# claimdesk configuration
#
# poll_interval_ms      how often `watch` re-fetches the queue
# privileged_operators  operators allowed to force-release other claims
# claim_stale_minutes   age after which `lock list` flags a claim as stale
# lease                 optional heartbeat leases that expire abandoned claims
";

pub fn cmd_init(global: &GlobalArgs) -> Result<()> {
    let ctx = DeskContext::resolve(global.root.as_deref())?;
    let already_initialized = ctx.desk_exists();

    create_dir(&ctx.desk_dir)?;
    create_dir(&ctx.locks_dir)?;
    create_dir(&ctx.events_dir())?;
    for resource_type in RESOURCE_TYPES {
        create_dir(&ctx.resources_dir.join(resource_type.as_str()))?;
    }

    let config_path = ctx.config_path();
    let config_created = if config_path.exists() {
        // Fail early on a config the other commands would reject.
        Config::load(&config_path)?;
        false
    } else {
        let yaml = Config::default().to_yaml()?;
        atomic_write_file(&config_path, &format!("{}\n{}", CONFIG_HEADER, yaml))?;
        true
    };

    let actor = OperatorContext::resolve(global.operator.as_deref(), &Config::default())
        .map(|op| op.username)
        .unwrap_or_else(|_| "unknown".to_string());
    EventLog::new(ctx.events_file()).append(
        &Event::new(EventAction::Init, actor).with_details(json!({
            "root": ctx.root.display().to_string(),
            "config_created": config_created,
            "reinitialized": already_initialized,
        })),
    )?;

    if already_initialized {
        println!("Reinitialized claimdesk at {}", ctx.desk_dir.display());
    } else {
        println!("Initialized claimdesk at {}", ctx.desk_dir.display());
    }
    if config_created {
        println!("  Created {}", config_path.display());
    }
    println!();
    println!("Next steps:");
    println!("  claimdesk add topup <id>");
    println!("  claimdesk list topup");

    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        DeskError::UserError(format!(
            "failed to create directory '{}': {}",
            path.display(),
            e
        ))
    })
}
