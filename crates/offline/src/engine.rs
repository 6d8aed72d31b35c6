//! Queue replay.
//!
//! The engine has two states, idle and draining. A drain:
//! 1. snapshots the queue (actions enqueued afterwards wait for the next
//!    drain);
//! 2. replays each action in FIFO order, one remote call at a time;
//! 3. removes each record right after its single attempt, whatever the
//!    outcome: success, domain rejection or network failure;
//! 4. returns to idle and fires the refresh registry.
//!
//! Records are never re-queued. A failed replay is logged and dropped
//! rather than retried behind the user's back, since the intent may have
//! gone stale while the device was offline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use staffsync_core::ActionId;
use staffsync_events::Subscription;

use crate::action::{ActionKind, QueuedAction};
use crate::api::{self, MarketplaceApi};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{ApiError, SyncError};
use crate::refresh::RefreshRegistry;
use crate::store::ActionStore;

/// Result of replaying one queued action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayResult {
    /// The backend accepted the mutation.
    Replayed,
    /// The backend refused the mutation (conflict, not found, validation).
    Rejected(String),
    /// No decision was obtained (network failure, timeout, server error).
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub action_id: ActionId,
    pub kind: ActionKind,
    pub result: ReplayResult,
}

/// Summary of one completed drain, in replay order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub outcomes: Vec<ReplayOutcome>,
}

impl DrainReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn replayed(&self) -> usize {
        self.count(|r| matches!(r, ReplayResult::Replayed))
    }

    pub fn rejected(&self) -> usize {
        self.count(|r| matches!(r, ReplayResult::Rejected(_)))
    }

    pub fn unreachable(&self) -> usize {
        self.count(|r| matches!(r, ReplayResult::Unreachable(_)))
    }

    fn count(&self, pred: impl Fn(&ReplayResult) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.result)).count()
    }
}

/// Clears the draining flag when the drain ends, however it ends.
struct DrainGuard<'a> {
    draining: &'a AtomicBool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.draining.store(false, Ordering::Release);
    }
}

/// Replays queued actions against the marketplace.
pub struct SyncEngine {
    store: Arc<dyn ActionStore>,
    api: Arc<dyn MarketplaceApi>,
    refresh: RefreshRegistry,
    draining: AtomicBool,
    replay_timeout: Option<Duration>,
}

impl core::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("draining", &self.is_replaying())
            .field("replay_timeout", &self.replay_timeout)
            .finish()
    }
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn ActionStore>,
        api: Arc<dyn MarketplaceApi>,
        refresh: RefreshRegistry,
    ) -> Self {
        Self {
            store,
            api,
            refresh,
            draining: AtomicBool::new(false),
            replay_timeout: None,
        }
    }

    /// Bound each replayed call. An elapsed budget counts as unreachable and
    /// the record is dropped like any other failure.
    pub fn with_replay_timeout(mut self, timeout: Duration) -> Self {
        self.replay_timeout = Some(timeout);
        self
    }

    /// Whether a drain is in progress.
    pub fn is_replaying(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Run one drain.
    ///
    /// Returns `Ok(None)` without doing anything when another drain is
    /// already active. A store failure aborts the drain; refresh callbacks
    /// then do not fire.
    pub async fn drain(&self) -> Result<Option<DrainReport>, SyncError> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("drain already in progress; skipping");
            return Ok(None);
        }

        let guard = DrainGuard {
            draining: &self.draining,
        };
        let result = self.replay_snapshot().await;
        drop(guard);

        match result {
            Ok(report) => {
                let notified = self.refresh.notify_all();
                tracing::info!(
                    replayed = report.replayed(),
                    rejected = report.rejected(),
                    unreachable = report.unreachable(),
                    notified,
                    "drain complete"
                );
                Ok(Some(report))
            }
            Err(err) => {
                tracing::error!(error = %err, "drain aborted");
                Err(err)
            }
        }
    }

    /// Start a drain on every connected transition of `monitor`.
    ///
    /// Disconnections are ignored: a running drain always finishes its
    /// snapshot. The engine is held weakly, so the subscription does not keep
    /// it alive. Drains run on the runtime current at attach time, so
    /// transitions reported from plain threads still start one.
    pub fn attach(self: &Arc<Self>, monitor: &ConnectivityMonitor) -> Subscription {
        let engine: Weak<Self> = Arc::downgrade(self);
        let runtime = tokio::runtime::Handle::try_current().ok();
        monitor.subscribe(move |connected| {
            if !connected {
                return;
            }
            let Some(engine) = engine.upgrade() else {
                return;
            };
            let handle = match runtime.clone() {
                Some(handle) => handle,
                None => match tokio::runtime::Handle::try_current() {
                    Ok(handle) => handle,
                    Err(err) => {
                        tracing::error!(
                            error = %err,
                            "no async runtime; online transition dropped, queue waits for the next one"
                        );
                        return;
                    }
                },
            };
            handle.spawn(async move {
                // Failures are logged by `drain`.
                let _ = engine.drain().await;
            });
        })
    }

    async fn replay_snapshot(&self) -> Result<DrainReport, SyncError> {
        let snapshot = self.store.list().await?;
        tracing::info!(pending = snapshot.len(), "draining action queue");

        let mut report = DrainReport {
            outcomes: Vec::with_capacity(snapshot.len()),
        };
        for queued in snapshot {
            let result = self.replay(&queued).await;
            self.store.remove_by_id(queued.id).await?;
            report.outcomes.push(ReplayOutcome {
                action_id: queued.id,
                kind: queued.kind(),
                result,
            });
        }
        Ok(report)
    }

    async fn replay(&self, queued: &QueuedAction) -> ReplayResult {
        let call = api::dispatch(self.api.as_ref(), &queued.action);
        let response = match self.replay_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(response) => response,
                Err(_) => Err(ApiError::Transport(format!(
                    "replay timed out after {limit:?}"
                ))),
            },
            None => call.await,
        };

        let action_id = queued.id;
        let kind = queued.kind().as_str();
        match response {
            Ok(snapshot) => {
                tracing::debug!(
                    %action_id,
                    kind,
                    application_id = %snapshot.id,
                    status = %snapshot.status,
                    "replayed queued action"
                );
                ReplayResult::Replayed
            }
            Err(err @ (ApiError::Transport(_) | ApiError::Server { .. })) => {
                tracing::warn!(%action_id, kind, error = %err, "replay failed; action dropped");
                ReplayResult::Unreachable(err.to_string())
            }
            Err(err) if err.is_conflict() => {
                tracing::warn!(
                    %action_id,
                    kind,
                    error = %err,
                    "replay rejected as conflicting; treated as satisfied"
                );
                ReplayResult::Rejected(err.to_string())
            }
            Err(err) => {
                tracing::warn!(%action_id, kind, error = %err, "replay rejected; action dropped");
                ReplayResult::Rejected(err.to_string())
            }
        }
    }
}
