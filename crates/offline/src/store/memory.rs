use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use staffsync_core::ActionId;

use super::ActionStore;
use crate::action::{Action, QueuedAction};
use crate::error::StoreError;

/// In-memory action store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryActionStore {
    actions: RwLock<Vec<QueuedAction>>,
    fail_writes: AtomicBool,
}

impl InMemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every subsequent `enqueue` and `remove_by_id` fail, as a full
    /// disk or revoked storage permission would.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other(
                "simulated storage write failure",
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ActionStore for InMemoryActionStore {
    async fn enqueue(&self, action: Action) -> Result<QueuedAction, StoreError> {
        self.check_writable()?;
        let queued = QueuedAction::new(action);
        self.actions
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .push(queued.clone());
        Ok(queued)
    }

    async fn list(&self) -> Result<Vec<QueuedAction>, StoreError> {
        Ok(self.actions.read().map_err(|_| StoreError::Poisoned)?.clone())
    }

    async fn remove_by_id(&self, id: ActionId) -> Result<(), StoreError> {
        self.check_writable()?;
        self.actions
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .retain(|queued| queued.id != id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.actions.read().map_err(|_| StoreError::Poisoned)?.len())
    }
}
