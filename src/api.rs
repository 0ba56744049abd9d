//! Client API boundary.
//!
//! [`ClaimApi`] is what the view model talks to: the listing endpoint plus
//! the claim, release, and force-release calls, each answering with either a
//! `200 {message}` style [`ApiReply`] or an [`ApiError`] carrying an HTTP-like
//! status and an operator-facing `detail`. [`LocalApi`] serves it in-process
//! from a shared [`ClaimCoordinator`] on behalf of one operator.

use crate::coordinator::{ClaimCoordinator, ClaimOutcome};
use crate::error::DeskError;
use crate::operator::OperatorContext;
use crate::resource::{ClaimableResource, ResourceKey, ResourceStatus, ResourceType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Successful response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiReply {
    pub message: String,
}

impl ApiReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failed response, one variant per status code the client distinguishes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 409: the claim is held by someone.
    #[error("{detail}")]
    Conflict { detail: String },

    /// 403: not the holder, or not privileged.
    #[error("{detail}")]
    Unauthorized { detail: String },

    /// 404: no such resource.
    #[error("{detail}")]
    NotFound { detail: String },

    /// 422: request well-formed but not applicable, e.g. a closed resource.
    #[error("{detail}")]
    Rejected { detail: String },

    /// 503: the backend could not be reached or failed.
    #[error("{detail}")]
    Transport { detail: String },
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Conflict { .. } => 409,
            ApiError::Unauthorized { .. } => 403,
            ApiError::NotFound { .. } => 404,
            ApiError::Rejected { .. } => 422,
            ApiError::Transport { .. } => 503,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            ApiError::Conflict { detail }
            | ApiError::Unauthorized { detail }
            | ApiError::NotFound { detail }
            | ApiError::Rejected { detail }
            | ApiError::Transport { detail } => detail,
        }
    }
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        let detail = err.to_string();
        match err {
            DeskError::Conflict(_) => ApiError::Conflict { detail },
            DeskError::Unauthorized(_) => ApiError::Unauthorized { detail },
            DeskError::NotFound(_) => ApiError::NotFound { detail },
            DeskError::Terminal(_) | DeskError::UserError(_) => ApiError::Rejected { detail },
            DeskError::StoreError(_) | DeskError::Transport(_) => ApiError::Transport { detail },
        }
    }
}

impl From<ApiError> for DeskError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Conflict { detail } => DeskError::Conflict(detail),
            ApiError::Unauthorized { detail } => DeskError::Unauthorized(detail),
            ApiError::NotFound { detail } => DeskError::NotFound(detail),
            ApiError::Rejected { detail } => DeskError::UserError(detail),
            ApiError::Transport { detail } => DeskError::Transport(detail),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The calls a claim-aware client makes, already bound to one operator.
pub trait ClaimApi: Send + Sync {
    /// Listing endpoint: all resources of a type with claim fields embedded.
    fn list(&self, resource_type: ResourceType) -> ApiResult<Vec<ClaimableResource>>;

    fn claim(&self, key: &ResourceKey) -> ApiResult<ApiReply>;

    fn release(&self, key: &ResourceKey) -> ApiResult<ApiReply>;

    /// Privileged only.
    fn force_release(&self, key: &ResourceKey) -> ApiResult<ApiReply>;

    /// Change business status; the caller must hold the claim.
    fn apply_status(&self, key: &ResourceKey, status: ResourceStatus) -> ApiResult<ApiReply>;
}

/// In-process [`ClaimApi`] for one operator.
#[derive(Clone)]
pub struct LocalApi {
    coordinator: Arc<ClaimCoordinator>,
    operator: OperatorContext,
}

impl LocalApi {
    pub fn new(coordinator: Arc<ClaimCoordinator>, operator: OperatorContext) -> Self {
        Self {
            coordinator,
            operator,
        }
    }

    pub fn operator(&self) -> &OperatorContext {
        &self.operator
    }
}

impl ClaimApi for LocalApi {
    fn list(&self, resource_type: ResourceType) -> ApiResult<Vec<ClaimableResource>> {
        Ok(self
            .coordinator
            .snapshot(resource_type, Some(&self.operator))?)
    }

    fn claim(&self, key: &ResourceKey) -> ApiResult<ApiReply> {
        match self.coordinator.claim(key, &self.operator)? {
            ClaimOutcome::Claimed(_) => Ok(ApiReply::new("Request claimed successfully")),
            ClaimOutcome::Conflict { detail, .. } => Err(ApiError::Conflict { detail }),
        }
    }

    fn release(&self, key: &ResourceKey) -> ApiResult<ApiReply> {
        self.coordinator.release(key, &self.operator)?;
        Ok(ApiReply::new("Request released successfully"))
    }

    fn force_release(&self, key: &ResourceKey) -> ApiResult<ApiReply> {
        let message = match self.coordinator.force_release(key, &self.operator)? {
            Some(previous) => format!(
                "Request force-released from {} successfully",
                previous.username
            ),
            None => "Request was not claimed".to_string(),
        };
        Ok(ApiReply::new(message))
    }

    fn apply_status(&self, key: &ResourceKey, status: ResourceStatus) -> ApiResult<ApiReply> {
        self.coordinator.apply_status(key, &self.operator, status)?;
        Ok(ApiReply::new(format!("Request marked {}", status)))
    }
}
