//! Implementation of the `claimdesk watch` command.
//!
//! `watch` runs the polling loop for one queue on behalf of the operator:
//! every tick it expires abandoned leases (when enabled), re-fetches the
//! queue, reconciles it into a [`ClaimView`], and prints any claim that was
//! taken away from the operator since the previous tick.

use crate::api::LocalApi;
use crate::cli::{GlobalArgs, WatchArgs};
use crate::commands::Desk;
use crate::coordinator::ClaimCoordinator;
use crate::error::Result;
use crate::poll::PollLoop;
use crate::view::{ClaimView, Notice, ReconcileReport, is_claimed_by_me};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

pub fn cmd_watch(global: &GlobalArgs, args: WatchArgs) -> Result<()> {
    let desk = Desk::open(global)?;
    let operator = desk.operator(global)?;

    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| desk.config.poll_interval());

    let api = LocalApi::new(Arc::clone(&desk.coordinator), operator.clone());
    let mut watcher = Watcher {
        coordinator: Arc::clone(&desk.coordinator),
        api,
        view: ClaimView::new(operator, args.resource_type),
    };

    if args.once {
        return watcher.tick();
    }

    let poll = PollLoop::new(interval);
    eprintln!("claimdesk watch: polling {}", args.resource_type);
    eprintln!("  operator: {}", watcher.view.operator().username);
    eprintln!("  interval: {}ms", poll.interval().as_millis());
    eprintln!("  lease:    {}", if desk.config.lease.enabled { "on" } else { "off" });

    let handle = poll.spawn(move || watcher.tick())?;
    handle.join()?;
    Ok(())
}

/// State carried from one tick to the next.
struct Watcher {
    coordinator: Arc<ClaimCoordinator>,
    api: LocalApi,
    view: ClaimView,
}

impl Watcher {
    fn tick(&mut self) -> Result<()> {
        let expired = self.coordinator.sweep_expired(Utc::now())?;
        for (key, previous) in &expired {
            println!("Lease expired: {} (was held by {})", key, previous.username);
        }

        let report = self.view.refresh(&self.api)?;
        self.print(&report);
        Ok(())
    }

    fn print(&mut self, report: &ReconcileReport) {
        for notice in self.view.take_notices() {
            match &notice {
                Notice::Revoked { .. } => {
                    println!();
                    println!("!! CLAIM REVOKED !!");
                    println!("   {}", notice);
                    println!();
                }
                Notice::Info(_) => println!("{}", notice),
                Notice::Error(_) => eprintln!("Error: {}", notice),
            }
        }

        let operator = self.view.operator();
        let total = self.view.resources().count();
        let mine = self
            .view
            .resources()
            .filter(|r| is_claimed_by_me(r, operator))
            .count();
        let open = self
            .view
            .resources()
            .filter(|r| !r.is_terminal() && !r.is_claimed())
            .count();

        println!(
            "[{}] {}: {} requests, {} unclaimed, {} held by you{}",
            Utc::now().format("%H:%M:%S"),
            self.view.resource_type(),
            total,
            open,
            mine,
            if report.has_revocations() {
                format!(", {} revoked", report.revoked.len())
            } else {
                String::new()
            }
        );
    }
}
