//! Direct-call path for user mutations.
//!
//! A mutation is first sent straight to the marketplace. Only a
//! connectivity failure turns it into a queued action; any other failure is
//! the user's to see.

use std::sync::Arc;

use staffsync_applications::{ApplicationSnapshot, ApplicationStatus};
use staffsync_core::{ApplicationId, JobId};

use crate::action::{Action, ActionKind, QueuedAction};
use crate::api::{self, MarketplaceApi};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{StoreError, SubmitError};
use crate::store::ActionStore;

/// How a mutation was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The backend applied it; the snapshot is authoritative.
    Completed(ApplicationSnapshot),
    /// The marketplace was unreachable; the action waits in the queue.
    Queued(QueuedAction),
}

impl Submission {
    /// Status the UI should show until the next refresh.
    pub fn optimistic_status(&self) -> ApplicationStatus {
        match self {
            Submission::Completed(snapshot) => snapshot.status,
            Submission::Queued(queued) => match queued.kind() {
                ActionKind::Apply => ApplicationStatus::Pending,
                ActionKind::Withdraw => ApplicationStatus::Withdrawn,
            },
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued(_))
    }
}

#[derive(Clone)]
pub struct OfflineClient {
    store: Arc<dyn ActionStore>,
    api: Arc<dyn MarketplaceApi>,
    monitor: ConnectivityMonitor,
}

impl core::fmt::Debug for OfflineClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OfflineClient")
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

impl OfflineClient {
    pub fn new(
        store: Arc<dyn ActionStore>,
        api: Arc<dyn MarketplaceApi>,
        monitor: ConnectivityMonitor,
    ) -> Self {
        Self {
            store,
            api,
            monitor,
        }
    }

    /// Apply to a job.
    pub async fn apply(
        &self,
        job_id: JobId,
        cover_note: Option<String>,
    ) -> Result<Submission, SubmitError> {
        self.submit(Action::apply(job_id, cover_note)).await
    }

    /// Withdraw an application.
    pub async fn withdraw(&self, application_id: ApplicationId) -> Result<Submission, SubmitError> {
        self.submit(Action::withdraw(application_id)).await
    }

    /// Number of actions waiting for replay.
    pub async fn pending_count(&self) -> Result<usize, StoreError> {
        self.store.count().await
    }

    /// The direct call is always attempted, even when the monitor last saw
    /// the device offline: that observation may already be stale.
    async fn submit(&self, action: Action) -> Result<Submission, SubmitError> {
        match api::dispatch(self.api.as_ref(), &action).await {
            Ok(snapshot) => Ok(Submission::Completed(snapshot)),
            Err(err) if err.is_connectivity() => {
                tracing::warn!(
                    kind = %action.kind(),
                    subject = action.subject(),
                    error = %err,
                    "marketplace unreachable; queueing action"
                );
                // The next successful probe is then an edge and drains the queue.
                self.monitor.report(false);
                self.enqueue(action).await
            }
            Err(err) => {
                tracing::info!(kind = %action.kind(), error = %err, "request rejected");
                Err(SubmitError::Rejected(err))
            }
        }
    }

    async fn enqueue(&self, action: Action) -> Result<Submission, SubmitError> {
        let kind = action.kind();
        match self.store.enqueue(action).await {
            Ok(queued) => {
                tracing::info!(action_id = %queued.id, %kind, "action queued for replay");
                Ok(Submission::Queued(queued))
            }
            Err(err) => {
                tracing::error!(%kind, error = %err, "failed to persist queued action");
                Err(SubmitError::Store(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryMarketplace;
    use crate::connectivity::StaticProbe;
    use crate::store::InMemoryActionStore;

    fn client(
        store: &Arc<InMemoryActionStore>,
        api: &Arc<InMemoryMarketplace>,
    ) -> (OfflineClient, ConnectivityMonitor) {
        let monitor = ConnectivityMonitor::new(Arc::new(StaticProbe::connected()));
        let client = OfflineClient::new(store.clone(), api.clone(), monitor.clone());
        (client, monitor)
    }

    fn job(id: &str) -> JobId {
        JobId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn online_apply_completes_directly() {
        let store = InMemoryActionStore::arc();
        let api = InMemoryMarketplace::arc();
        let (client, _) = client(&store, &api);

        let submission = client.apply(job("J1"), None).await.unwrap();
        assert!(matches!(submission, Submission::Completed(ref s) if s.job_id == job("J1")));
        assert_eq!(submission.optimistic_status(), ApplicationStatus::Pending);
        assert_eq!(client.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn connectivity_failure_queues_the_action() {
        let store = InMemoryActionStore::arc();
        let api = InMemoryMarketplace::arc();
        api.set_reachable(false);
        let (client, monitor) = client(&store, &api);

        let submission = client
            .withdraw(ApplicationId::parse("A1").unwrap())
            .await
            .unwrap();

        assert!(submission.is_queued());
        assert_eq!(submission.optimistic_status(), ApplicationStatus::Withdrawn);
        assert_eq!(client.pending_count().await.unwrap(), 1);
        assert_eq!(monitor.last_known(), Some(false));
    }

    #[tokio::test]
    async fn stale_offline_observation_still_tries_the_network() {
        let store = InMemoryActionStore::arc();
        let api = InMemoryMarketplace::arc();
        let (client, monitor) = client(&store, &api);

        api.set_reachable(false);
        assert!(client.apply(job("J1"), None).await.unwrap().is_queued());
        assert_eq!(monitor.last_known(), Some(false));

        api.set_reachable(true);
        let submission = client.apply(job("J2"), None).await.unwrap();

        assert!(matches!(submission, Submission::Completed(ref s) if s.job_id == job("J2")));
        assert_eq!(api.call_count(), 2);
        assert_eq!(client.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn domain_rejection_is_surfaced_not_queued() {
        let store = InMemoryActionStore::arc();
        let api = InMemoryMarketplace::arc();
        let (client, _) = client(&store, &api);
        client.apply(job("J1"), None).await.unwrap();

        let err = client.apply(job("J1"), None).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(ref api_err) if api_err.is_conflict()));
        assert_eq!(client.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn persistence_failure_is_surfaced() {
        let store = InMemoryActionStore::arc();
        let api = InMemoryMarketplace::arc();
        api.set_reachable(false);
        let (client, _) = client(&store, &api);
        store.fail_writes(true);

        let err = client.apply(job("J1"), None).await.unwrap_err();
        assert!(matches!(err, SubmitError::Store(_)));
    }
}
