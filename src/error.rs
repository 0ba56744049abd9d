//! Error types for claimdesk.
//!
//! Uses thiserror for derive macros and provides operator-actionable messages.
//! A lost claim race is an ordinary outcome of the protocol and has its own
//! variant so callers can tell it apart from real failures.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for claimdesk operations.
#[derive(Error, Debug)]
pub enum DeskError {
    /// Invalid arguments or the desk is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// The resource does not exist in its queue.
    #[error("not found: {0}")]
    NotFound(String),

    /// Another operator already holds the claim.
    #[error("{0}")]
    Conflict(String),

    /// The caller is not the holder or lacks the elevated role.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The resource has reached a terminal status and is claim-exempt.
    #[error("request is closed: {0}")]
    Terminal(String),

    /// The lock store could not be read or written.
    #[error("lock store failure: {0}")]
    StoreError(String),

    /// The remote side could not be reached.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl DeskError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeskError::UserError(_) => exit_codes::USER_ERROR,
            DeskError::NotFound(_) => exit_codes::USER_ERROR,
            DeskError::Terminal(_) => exit_codes::USER_ERROR,
            DeskError::Conflict(_) => exit_codes::CONFLICT,
            DeskError::Unauthorized(_) => exit_codes::UNAUTHORIZED,
            DeskError::StoreError(_) => exit_codes::STORE_FAILURE,
            DeskError::Transport(_) => exit_codes::STORE_FAILURE,
        }
    }
}

/// Result type alias for claimdesk operations.
pub type Result<T> = std::result::Result<T, DeskError>;
