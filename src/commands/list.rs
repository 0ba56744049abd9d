//! Implementation of the `claimdesk list` command.

use crate::cli::{GlobalArgs, ListArgs};
use crate::commands::Desk;
use crate::error::Result;
use crate::gate::ActionGate;
use crate::operator::OperatorContext;
use crate::resource::ClaimableResource;
use crate::view::{claim_age_description, is_claimed_by_me};
use chrono::{DateTime, Utc};

pub fn cmd_list(global: &GlobalArgs, args: ListArgs) -> Result<()> {
    let desk = Desk::open(global)?;
    let operator = desk.operator(global)?;

    let resources = desk
        .coordinator
        .snapshot(args.resource_type, Some(&operator))?;

    if resources.is_empty() {
        println!("No {} requests.", args.resource_type);
        return Ok(());
    }

    println!(
        "{} requests ({}), as {}{}:",
        args.resource_type,
        resources.len(),
        operator.username,
        if operator.is_privileged {
            " [privileged]"
        } else {
            ""
        }
    );
    println!();

    let now = Utc::now();
    for resource in &resources {
        println!("{}", format_row(resource, &operator, now));
    }

    let mine = resources
        .iter()
        .filter(|r| is_claimed_by_me(r, &operator))
        .count();
    if mine > 0 {
        println!();
        println!("You hold {} claim(s).", mine);
    }

    Ok(())
}

/// One line per resource: ID, status, holder and age, permitted actions.
pub(crate) fn format_row(
    resource: &ClaimableResource,
    operator: &OperatorContext,
    now: DateTime<Utc>,
) -> String {
    let holder = match (&resource.claimed_by_username, resource.claimed_at) {
        (Some(_), Some(at)) if is_claimed_by_me(resource, operator) => {
            format!("you, {}", claim_age_description(at, now))
        }
        (Some(name), Some(at)) => format!("{}, {}", name, claim_age_description(at, now)),
        (Some(name), None) => name.clone(),
        _ => "-".to_string(),
    };

    let actions = ActionGate::permissions(resource, operator).labels().join(",");

    format!(
        "  {:<20} {:<15} {:<28} [{}]",
        resource.resource_id,
        resource.status.as_str(),
        holder,
        actions
    )
}
