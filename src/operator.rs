//! Operator identity passed explicitly through the protocol.
//!
//! Nothing in the coordinator, API, or view model reads identity from the
//! environment. The CLI resolves an [`OperatorContext`] once at startup and
//! hands it down.

use crate::config::Config;
use crate::error::{DeskError, Result};
use serde::{Deserialize, Serialize};

/// Who is acting, and whether they may force-release other operators' claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorContext {
    /// Stable operator identifier stored as `claimed_by`.
    pub id: String,

    /// Display name stored as `claimed_by_username`; predicates compare on this.
    pub username: String,

    /// Elevated role permitted to force-release.
    pub is_privileged: bool,
}

impl OperatorContext {
    /// A regular operator whose ID and username are the same string.
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: username.clone(),
            username,
            is_privileged: false,
        }
    }

    /// Use a distinct stable ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn privileged(mut self) -> Self {
        self.is_privileged = true;
        self
    }

    /// Resolve the operator for a CLI session.
    ///
    /// The username comes from the explicit argument, otherwise from
    /// `CLAIMDESK_OPERATOR`, otherwise from the login user. The privileged
    /// flag comes from the config's `privileged_operators`, never from the
    /// caller.
    pub fn resolve(explicit: Option<&str>, config: &Config) -> Result<Self> {
        let username = match explicit {
            Some(name) => name.to_string(),
            None => std::env::var("CLAIMDESK_OPERATOR")
                .or_else(|_| std::env::var("USER"))
                .or_else(|_| std::env::var("USERNAME"))
                .map_err(|_| {
                    DeskError::UserError(
                        "could not determine operator name.\n\n\
                         Pass --operator <name> or set CLAIMDESK_OPERATOR."
                            .to_string(),
                    )
                })?,
        };

        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(DeskError::UserError(
                "operator name must not be empty".to_string(),
            ));
        }

        let mut operator = Self::new(username);
        operator.is_privileged = config
            .privileged_operators
            .iter()
            .any(|p| p == &operator.username);
        Ok(operator)
    }
}
