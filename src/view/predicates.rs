//! Read-only predicates over a resource and the current operator.

use crate::operator::OperatorContext;
use crate::resource::ClaimableResource;
use chrono::{DateTime, Utc};

/// The resource's claim holder is this operator.
pub fn is_claimed_by_me(resource: &ClaimableResource, operator: &OperatorContext) -> bool {
    resource.claimed_by_username.as_deref() == Some(operator.username.as_str())
}

/// Someone other than this operator holds the claim.
pub fn is_claimed_by_other(resource: &ClaimableResource, operator: &OperatorContext) -> bool {
    resource.claimed_by.is_some()
        && resource.claimed_by_username.as_deref() != Some(operator.username.as_str())
}

/// Humanized claim age, in whole minutes or hours.
///
/// Timestamps in the future (clock skew between hosts) read as "just now".
pub fn claim_age_description(claimed_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = now.signed_duration_since(claimed_at).num_minutes();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        plural(minutes, "minute")
    } else {
        plural(minutes / 60, "hour")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
