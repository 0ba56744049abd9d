//! Action gate: which actions an operator may take on a resource.
//!
//! Decisions are pure functions of the resource snapshot and the operator.
//! A denied action fails here, before any call to the coordinator, with a
//! message naming the missing precondition.

use crate::operator::OperatorContext;
use crate::resource::ClaimableResource;
use crate::view::predicates::{is_claimed_by_me, is_claimed_by_other};
use std::fmt;
use thiserror::Error;

/// Operator actions subject to gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Claim,
    Release,
    ForceRelease,
    /// Approve, reject, edit: anything that changes business state.
    Mutate,
    View,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Claim,
        Action::Release,
        Action::ForceRelease,
        Action::Mutate,
        Action::View,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Claim => "claim",
            Action::Release => "release",
            Action::ForceRelease => "force-release",
            Action::Mutate => "mutate",
            Action::View => "view",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an action was refused locally.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDenial {
    #[error("claim first")]
    ClaimFirst,

    #[error("not your claim")]
    NotYourClaim,

    #[error("requires elevated role")]
    RequiresElevatedRole,

    #[error("already claimed")]
    AlreadyClaimed,

    #[error("request is closed")]
    Closed,

    #[error("claimed by another operator")]
    ClaimedByOther,

    /// There is no claim to force-release.
    #[error("not claimed")]
    NotClaimed,

    /// The resource is not in the operator's last snapshot.
    #[error("not in the current listing")]
    Unlisted,
}

/// Everything the operator may do with one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    pub claim: bool,
    pub release: bool,
    pub force_release: bool,
    pub mutate: bool,
    pub view: bool,
}

impl Permissions {
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Claim => self.claim,
            Action::Release => self.release,
            Action::ForceRelease => self.force_release,
            Action::Mutate => self.mutate,
            Action::View => self.view,
        }
    }

    /// Names of permitted actions, in [`Action::ALL`] order.
    pub fn labels(&self) -> Vec<&'static str> {
        Action::ALL
            .iter()
            .filter(|a| self.allows(**a))
            .map(Action::as_str)
            .collect()
    }
}

pub struct ActionGate;

impl ActionGate {
    pub fn check(
        resource: &ClaimableResource,
        operator: &OperatorContext,
        action: Action,
    ) -> Result<(), GateDenial> {
        let mine = is_claimed_by_me(resource, operator);

        match action {
            Action::Claim => {
                if resource.is_terminal() {
                    Err(GateDenial::Closed)
                } else if resource.is_claimed() {
                    Err(GateDenial::AlreadyClaimed)
                } else {
                    Ok(())
                }
            }
            Action::Release | Action::Mutate => {
                if mine {
                    Ok(())
                } else if is_claimed_by_other(resource, operator) {
                    Err(GateDenial::NotYourClaim)
                } else {
                    Err(GateDenial::ClaimFirst)
                }
            }
            Action::ForceRelease => {
                if !operator.is_privileged {
                    Err(GateDenial::RequiresElevatedRole)
                } else if !resource.is_claimed() {
                    Err(GateDenial::NotClaimed)
                } else {
                    Ok(())
                }
            }
            Action::View => {
                if is_claimed_by_other(resource, operator) && !resource.is_terminal() {
                    Err(GateDenial::ClaimedByOther)
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn permissions(resource: &ClaimableResource, operator: &OperatorContext) -> Permissions {
        let allowed = |action| Self::check(resource, operator, action).is_ok();
        Permissions {
            claim: allowed(Action::Claim),
            release: allowed(Action::Release),
            force_release: allowed(Action::ForceRelease),
            mutate: allowed(Action::Mutate),
            view: allowed(Action::View),
        }
    }
}
