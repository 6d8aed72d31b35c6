//! Marketplace mutation endpoints.

mod http;
mod memory;

pub use http::HttpMarketplaceClient;
pub use memory::{InMemoryMarketplace, RecordedCall};

use serde::{Deserialize, Serialize};

use staffsync_applications::ApplicationSnapshot;
use staffsync_core::{ApplicationId, JobId};

use crate::action::{Action, ApplyPayload, WithdrawPayload};
use crate::error::ApiError;

/// Body of `POST /applications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_note: Option<String>,
}

/// Body of `POST /applications/{id}/withdraw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub application_id: ApplicationId,
}

impl From<&ApplyPayload> for ApplyRequest {
    fn from(payload: &ApplyPayload) -> Self {
        Self {
            job_id: payload.job_id.clone(),
            cover_note: payload.cover_note.clone(),
        }
    }
}

impl From<&WithdrawPayload> for WithdrawRequest {
    fn from(payload: &WithdrawPayload) -> Self {
        Self {
            application_id: payload.application_id.clone(),
        }
    }
}

/// Remote mutation contract of the marketplace backend.
#[async_trait::async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Create an application in `pending`.
    async fn apply(&self, request: &ApplyRequest) -> Result<ApplicationSnapshot, ApiError>;

    /// Move an application to `withdrawn`.
    async fn withdraw(&self, request: &WithdrawRequest) -> Result<ApplicationSnapshot, ApiError>;
}

/// Invoke the endpoint matching the action's type.
pub async fn dispatch(
    api: &dyn MarketplaceApi,
    action: &Action,
) -> Result<ApplicationSnapshot, ApiError> {
    match action {
        Action::Apply(payload) => api.apply(&ApplyRequest::from(payload)).await,
        Action::Withdraw(payload) => api.withdraw(&WithdrawRequest::from(payload)).await,
    }
}
