//! Production wiring of the offline layer.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use staffsync_events::Subscription;

use crate::api::{HttpMarketplaceClient, MarketplaceApi};
use crate::client::OfflineClient;
use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe, HttpHealthProbe, WatchHandle};
use crate::engine::SyncEngine;
use crate::refresh::RefreshRegistry;
use crate::store::{ActionStore, SqliteActionStore};

/// What the presentation layer renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    pub is_connected: bool,
    pub is_replaying_queue: bool,
}

/// A running offline layer: store, monitor, engine and client wired together.
pub struct OfflineRuntime {
    client: OfflineClient,
    monitor: ConnectivityMonitor,
    refresh: RefreshRegistry,
    engine: Arc<SyncEngine>,
    attachment: Subscription,
    watcher: WatchHandle,
}

impl core::fmt::Debug for OfflineRuntime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OfflineRuntime")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl OfflineRuntime {
    /// Open the on-disk queue and start syncing against `config.api_url`.
    pub async fn start(config: SyncConfig) -> anyhow::Result<Self> {
        let store = SqliteActionStore::open(&config.queue_db_path)
            .await
            .with_context(|| {
                format!(
                    "failed to open action queue at {}",
                    config.queue_db_path.display()
                )
            })?;

        let api = HttpMarketplaceClient::from_config(&config)
            .context("failed to build marketplace client")?;
        let probe = HttpHealthProbe::new(&config.api_url, config.request_timeout)
            .context("failed to build connectivity probe")?;

        Ok(Self::assemble(Arc::new(store), Arc::new(api), Arc::new(probe), &config).await)
    }

    /// Wire the runtime over injected parts.
    ///
    /// `store` must already be hydrated. The first connectivity observation
    /// is made here; when it finds the device online, actions left over from
    /// a previous session start draining immediately.
    pub async fn assemble(
        store: Arc<dyn ActionStore>,
        api: Arc<dyn MarketplaceApi>,
        probe: Arc<dyn ConnectivityProbe>,
        config: &SyncConfig,
    ) -> Self {
        let monitor = ConnectivityMonitor::new(probe);
        let refresh = RefreshRegistry::new();

        let mut engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&api), refresh.clone());
        if let Some(timeout) = config.replay_timeout {
            engine = engine.with_replay_timeout(timeout);
        }
        let engine = Arc::new(engine);
        let attachment = engine.attach(&monitor);

        let connected = monitor.refresh().await;
        let watcher = monitor.watch(config.probe_interval);
        tracing::info!(connected, api_url = %config.api_url, "offline runtime started");

        let client = OfflineClient::new(store, api, monitor.clone());
        Self {
            client,
            monitor,
            refresh,
            engine,
            attachment,
            watcher,
        }
    }

    pub fn client(&self) -> &OfflineClient {
        &self.client
    }

    pub fn refresh_registry(&self) -> &RefreshRegistry {
        &self.refresh
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn state(&self) -> ConnectivityState {
        ConnectivityState {
            is_connected: self.monitor.last_known().unwrap_or(true),
            is_replaying_queue: self.engine.is_replaying(),
        }
    }

    /// Stop polling and detach the engine. A drain already running finishes
    /// in the background.
    pub async fn shutdown(self) {
        self.attachment.unsubscribe();
        self.watcher.shutdown().await;
        tracing::info!("offline runtime stopped");
    }
}
