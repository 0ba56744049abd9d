//! Claimable resources and their repositories.
//!
//! A resource is any queue item subject to exclusive processing: a top-up,
//! a transfer, or a share request. Only the fields the claim protocol reads
//! are modelled; business fields ride along untouched in `extra`.

mod repository;
mod types;


pub use repository::{FileResourceRepository, MemoryResourceRepository, ResourceRepository};
pub use types::{
    ClaimableResource, RESOURCE_TYPES, ResourceKey, ResourceRecord, ResourceStatus, ResourceType,
    validate_resource_id,
};
