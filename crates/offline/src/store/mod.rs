//! Durable, ordered storage for queued actions.

mod memory;
mod sqlite;

pub use memory::InMemoryActionStore;
pub use sqlite::SqliteActionStore;

use staffsync_core::ActionId;

use crate::action::{Action, QueuedAction};
use crate::error::StoreError;

/// Action queue store abstraction.
///
/// Implementations keep records in enqueue order and make each mutation
/// atomic: a concurrent `list` never observes a half-written record.
#[async_trait::async_trait]
pub trait ActionStore: Send + Sync {
    /// Assign an id and timestamp, append, and persist before returning.
    async fn enqueue(&self, action: Action) -> Result<QueuedAction, StoreError>;

    /// Snapshot of all records, oldest first.
    async fn list(&self) -> Result<Vec<QueuedAction>, StoreError>;

    /// Remove a record. Removing an absent id is a no-op.
    async fn remove_by_id(&self, id: ActionId) -> Result<(), StoreError>;

    /// Number of pending records (UI badges).
    async fn count(&self) -> Result<usize, StoreError>;
}
