//! Implementation of `claimdesk lock list` and `claimdesk lock sweep`.

use crate::cli::GlobalArgs;
use crate::commands::Desk;
use crate::error::Result;
use crate::store::FileLockStore;
use crate::view::claim_age_description;
use chrono::{Duration, Utc};

pub fn cmd_lock_list(global: &GlobalArgs) -> Result<()> {
    let desk = Desk::open(global)?;
    let claims = desk.coordinator.claims(None)?;

    if claims.is_empty() {
        println!("No active claims.");
        return Ok(());
    }

    let now = Utc::now();
    let stale_after = Duration::minutes(desk.config.claim_stale_minutes as i64);
    let store = FileLockStore::new(&desk.ctx.locks_dir);

    println!("Active claims ({}):", claims.len());
    println!();

    let mut stale_count = 0;
    for (key, record) in &claims {
        let is_stale = record.age(now) > stale_after;
        if is_stale {
            stale_count += 1;
        }

        println!("  {}:", key);
        println!("    Holder:     {} ({})", record.username, record.operator_id);
        if let Some(host) = &record.host {
            println!("    Host:       {}", host);
        }
        println!(
            "    Claimed:    {}",
            record.claimed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("    Age:        {}", claim_age_description(record.claimed_at, now));
        if desk.config.lease.enabled {
            println!(
                "    Heartbeat:  {}",
                claim_age_description(record.heartbeat_at, now)
            );
        }
        if is_stale {
            println!(
                "    Status:     STALE (exceeds {} min threshold)",
                desk.config.claim_stale_minutes
            );
        }
        println!("    Path:       {}", store.lock_path(key).display());
        println!();
    }

    if stale_count > 0 {
        println!(
            "Note: {} claim(s) are stale. A privileged operator can run \
             `claimdesk force-release <type> <id>` to free them.",
            stale_count
        );
    }

    Ok(())
}

pub fn cmd_lock_sweep(global: &GlobalArgs) -> Result<()> {
    let desk = Desk::open(global)?;

    if !desk.config.lease.enabled {
        println!("Leases are disabled; claims only end by release or force-release.");
        println!(
            "Set `lease.enabled: true` in {} to expire abandoned claims.",
            desk.ctx.config_path().display()
        );
        return Ok(());
    }

    let expired = desk.coordinator.sweep_expired(Utc::now())?;
    if expired.is_empty() {
        println!("No expired claims.");
        return Ok(());
    }

    println!("Expired claims ({}):", expired.len());
    for (key, previous) in &expired {
        println!(
            "  {} (held by {}, last seen {})",
            key,
            previous.username,
            previous.heartbeat_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}
