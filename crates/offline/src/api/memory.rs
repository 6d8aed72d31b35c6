use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;

use staffsync_applications::{ApplicationBook, ApplicationSnapshot, ApplicationStatus};
use staffsync_core::{ApplicationId, DomainResult, JobId};

use super::{ApplyRequest, MarketplaceApi, WithdrawRequest};
use crate::error::ApiError;

/// A call received by [`InMemoryMarketplace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Apply(ApplyRequest),
    Withdraw(WithdrawRequest),
}

#[derive(Debug, Default)]
struct MarketplaceState {
    book: ApplicationBook,
    calls: Vec<RecordedCall>,
}

/// In-memory marketplace for tests/dev.
///
/// Applies the real application rules through an [`ApplicationBook`] and
/// records every call it receives, reachable or not.
#[derive(Debug)]
pub struct InMemoryMarketplace {
    state: Mutex<MarketplaceState>,
    reachable: AtomicBool,
    latency: Mutex<Duration>,
}

impl Default for InMemoryMarketplace {
    fn default() -> Self {
        Self {
            state: Mutex::new(MarketplaceState::default()),
            reachable: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
        }
    }
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// When unreachable, every call fails with [`ApiError::Transport`].
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delay applied to every call before it is handled.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn application(&self, application_id: &ApplicationId) -> Option<ApplicationSnapshot> {
        self.state().book.get(application_id)
    }

    pub fn applications(&self) -> Vec<ApplicationSnapshot> {
        self.state().book.snapshots()
    }

    /// Create an application server-side without recording a call.
    pub fn seed_application(&self, job_id: JobId) -> DomainResult<ApplicationSnapshot> {
        self.state().book.submit(job_id, None, Utc::now())
    }

    /// Move an application as a reviewer (or another device) would.
    pub fn advance(
        &self,
        application_id: &ApplicationId,
        next: ApplicationStatus,
    ) -> DomainResult<ApplicationSnapshot> {
        self.state().book.advance(application_id, next, Utc::now())
    }

    fn state(&self) -> MutexGuard<'_, MarketplaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn receive(&self, call: RecordedCall) -> Result<(), ApiError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.state().calls.push(call);
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::Transport("network unreachable".into()))
        }
    }
}

#[async_trait::async_trait]
impl MarketplaceApi for InMemoryMarketplace {
    async fn apply(&self, request: &ApplyRequest) -> Result<ApplicationSnapshot, ApiError> {
        self.receive(RecordedCall::Apply(request.clone())).await?;
        self.state()
            .book
            .submit(request.job_id.clone(), request.cover_note.clone(), Utc::now())
            .map_err(ApiError::from)
    }

    async fn withdraw(&self, request: &WithdrawRequest) -> Result<ApplicationSnapshot, ApiError> {
        self.receive(RecordedCall::Withdraw(request.clone())).await?;
        self.state()
            .book
            .withdraw(&request.application_id, Utc::now())
            .map_err(ApiError::from)
    }
}
