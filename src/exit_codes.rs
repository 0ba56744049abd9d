//! Exit code constants for the claimdesk CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, unknown resource, invalid state)
//! - 2: Claim conflict (another operator holds the claim)
//! - 3: Unauthorized (not the holder, missing elevated role, gate denial)
//! - 4: Lock store failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, unknown resource, or invalid state.
pub const USER_ERROR: i32 = 1;

/// The claim is held by another operator.
pub const CONFLICT: i32 = 2;

/// The caller lacks the claim or the role required for the action.
pub const UNAUTHORIZED: i32 = 3;

/// The lock store could not be read or written.
pub const STORE_FAILURE: i32 = 4;
