//! Implementation of `claim`, `release`, `force-release` and `set-status`.
//!
//! Each command reads the request's current claim state, checks the action
//! gate (a refusal never touches the store), then goes through the client
//! API so the operator sees the same messages any other client would.

use crate::api::{ApiReply, ApiResult, ClaimApi, LocalApi};
use crate::cli::{GlobalArgs, SetStatusArgs, TargetArgs};
use crate::commands::{Desk, denial_error};
use crate::error::{DeskError, Result};
use crate::gate::{Action, ActionGate};
use crate::resource::ResourceKey;

pub fn cmd_claim(global: &GlobalArgs, args: TargetArgs) -> Result<()> {
    let reply = run(global, &args, Action::Claim, |api, key| api.claim(key))?;
    println!("{}", reply.message);
    Ok(())
}

pub fn cmd_release(global: &GlobalArgs, args: TargetArgs) -> Result<()> {
    let reply = run(global, &args, Action::Release, |api, key| api.release(key))?;
    println!("{}", reply.message);
    Ok(())
}

pub fn cmd_force_release(global: &GlobalArgs, args: TargetArgs) -> Result<()> {
    let reply = run(global, &args, Action::ForceRelease, |api, key| {
        api.force_release(key)
    })?;
    println!("{}", reply.message);
    Ok(())
}

pub fn cmd_set_status(global: &GlobalArgs, args: SetStatusArgs) -> Result<()> {
    let status = args.status;
    let reply = run(global, &args.target, Action::Mutate, |api, key| {
        api.apply_status(key, status)
    })?;
    println!("{}", reply.message);
    if status.is_terminal() {
        println!("Claim released.");
    }
    Ok(())
}

fn run<F>(global: &GlobalArgs, target: &TargetArgs, action: Action, call: F) -> Result<ApiReply>
where
    F: FnOnce(&dyn ClaimApi, &ResourceKey) -> ApiResult<ApiReply>,
{
    let desk = Desk::open(global)?;
    let operator = desk.operator(global)?;
    let key = ResourceKey::new(target.resource_type, &target.resource_id)?;

    let resource = desk.coordinator.get(&key)?;
    ActionGate::check(&resource, &operator, action).map_err(|d| denial_error(&key, d))?;

    let api = LocalApi::new(desk.coordinator.clone(), operator);
    call(&api, &key).map_err(DeskError::from)
}
