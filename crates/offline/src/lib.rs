//! `staffsync-offline`: offline action queue and sync engine.
//!
//! User mutations (apply to a job, withdraw an application) go straight to
//! the marketplace when the device is online. When the network is gone they
//! are recorded in a durable FIFO queue instead, and the [`SyncEngine`]
//! replays them, once each and in order, on the next offline→online
//! transition reported by the [`ConnectivityMonitor`]. Views registered with
//! the [`RefreshRegistry`] are told to re-fetch after every drain.
//!
//! Replay is at most once per record: whatever the outcome, the record is
//! removed after its attempt.

pub mod action;
pub mod api;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod refresh;
pub mod runtime;
pub mod store;

pub use action::{Action, ActionKind, ApplyPayload, QueuedAction, WithdrawPayload};
pub use api::{
    ApplyRequest, HttpMarketplaceClient, InMemoryMarketplace, MarketplaceApi, RecordedCall,
    WithdrawRequest,
};
pub use client::{OfflineClient, Submission};
pub use config::SyncConfig;
pub use connectivity::{
    ConnectivityMonitor, ConnectivityProbe, HttpHealthProbe, ProbeError, StaticProbe, WatchHandle,
};
pub use engine::{DrainReport, ReplayOutcome, ReplayResult, SyncEngine};
pub use error::{ApiError, ConfigError, StoreError, SubmitError, SyncError};
pub use refresh::RefreshRegistry;
pub use runtime::{ConnectivityState, OfflineRuntime};
pub use store::{ActionStore, InMemoryActionStore, SqliteActionStore};

pub use staffsync_events::Subscription;
