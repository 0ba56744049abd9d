//! Implementation of the `claimdesk notices` command.
//!
//! Reads the audit log for force-releases and lease expiries that took a
//! claim away from the current operator.

use crate::cli::{GlobalArgs, NoticesArgs};
use crate::commands::Desk;
use crate::error::Result;
use crate::events::EventAction;

pub fn cmd_notices(global: &GlobalArgs, args: NoticesArgs) -> Result<()> {
    let desk = Desk::open(global)?;
    let operator = desk.operator(global)?;

    let events = desk
        .events()
        .revocations_for(&operator.username, args.limit)?;

    if events.is_empty() {
        println!("No revoked claims for {}.", operator.username);
        return Ok(());
    }

    println!("Revoked claims for {} (newest first):", operator.username);
    for event in &events {
        let resource = event.resource.as_deref().unwrap_or("?");
        let how = match event.action {
            EventAction::LeaseExpired => "lease expired".to_string(),
            _ => format!("force-released by {}", event.actor),
        };
        println!(
            "  {}  {:<24} {}",
            event.ts.format("%Y-%m-%d %H:%M:%S UTC"),
            resource,
            how
        );
    }

    Ok(())
}
