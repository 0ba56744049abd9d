//! Claim-aware view model.
//!
//! Each operator's client keeps a private cached snapshot of one resource
//! queue, refreshed only by polling. Reconciliation compares each fresh
//! snapshot with what the operator believed they held, and raises a
//! revocation notice when a claim was taken away between polls. The verbs
//! (`claim_request`, `release_request`, `force_release_request`) check the
//! action gate before any call and return whether the call succeeded, so the
//! caller can trigger its own refresh.

mod model;
pub mod predicates;


pub use model::{ClaimView, DetailView, EditForm, Notice, ReconcileReport};
pub use predicates::{claim_age_description, is_claimed_by_me, is_claimed_by_other};
