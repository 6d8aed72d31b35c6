//! SQLite-backed action queue.
//!
//! Records live in the `action_queue` table, ordered by an autoincrement
//! sequence. The database runs in WAL mode with `synchronous = FULL`, so an
//! `INSERT` that has returned is on disk: a crash right after `enqueue`
//! cannot lose the action.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};

use staffsync_core::ActionId;

use super::ActionStore;
use crate::action::{Action, ActionKind, QueuedAction};
use crate::error::StoreError;

/// SQLite action queue.
///
/// Cheap to clone; clones share the connection pool. A value only exists
/// once the queue has been opened and hydrated.
#[derive(Debug, Clone)]
pub struct SqliteActionStore {
    pool: SqlitePool,
}

impl SqliteActionStore {
    /// Open (creating if needed) the queue database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %path.display(), "opened action queue database");
        Self::init(pool).await
    }

    /// Open a transient queue that lives as long as the store (tests).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to `:memory:` is its own database: pin exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS action_queue (
                seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT NOT NULL UNIQUE,
                action_type  TEXT NOT NULL,
                payload      TEXT NOT NULL,
                timestamp    INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let store = Self { pool };
        let pending = store.count().await?;
        tracing::info!(pending, "action queue hydrated");
        Ok(store)
    }

    /// Close the pool, waiting for in-flight statements.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl ActionStore for SqliteActionStore {
    async fn enqueue(&self, action: Action) -> Result<QueuedAction, StoreError> {
        let queued = QueuedAction::new(action);
        let payload = queued.action.payload_json()?;

        sqlx::query(
            r#"
            INSERT INTO action_queue (id, action_type, payload, timestamp)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(queued.id.to_string())
        .bind(queued.kind().as_str())
        .bind(payload)
        .bind(queued.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(queued)
    }

    async fn list(&self) -> Result<Vec<QueuedAction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, action_type, payload, timestamp
            FROM action_queue
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_action).collect()
    }

    async fn remove_by_id(&self, id: ActionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM action_queue WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM action_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Map a database row into a `QueuedAction`.
fn row_to_action(row: SqliteRow) -> Result<QueuedAction, StoreError> {
    let id_str: String = row.try_get("id")?;
    let corrupt = |reason: String| StoreError::Corrupt {
        id: id_str.clone(),
        reason,
    };

    let id = ActionId::from_str(&id_str).map_err(|e| corrupt(e.to_string()))?;

    let type_str: String = row.try_get("action_type")?;
    let kind = ActionKind::from_str(&type_str).map_err(|e| corrupt(e.to_string()))?;

    let payload: String = row.try_get("payload")?;
    let action = Action::from_parts(kind, &payload)
        .map_err(|e| corrupt(format!("invalid {kind} payload: {e}")))?;

    let millis: i64 = row.try_get("timestamp")?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| corrupt(format!("timestamp {millis} out of range")))?;

    Ok(QueuedAction {
        id,
        action,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use staffsync_core::{ApplicationId, JobId};

    #[tokio::test]
    async fn records_round_trip_in_order() {
        let store = SqliteActionStore::open_in_memory().await.unwrap();
        let withdraw = store
            .enqueue(Action::withdraw(ApplicationId::parse("A1").unwrap()))
            .await
            .unwrap();
        let apply = store
            .enqueue(Action::apply(
                JobId::parse("J2").unwrap(),
                Some("Available weekends".into()),
            ))
            .await
            .unwrap();

        assert_eq!(store.list().await.unwrap(), vec![withdraw, apply]);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = SqliteActionStore::open_in_memory().await.unwrap();
        let queued = store
            .enqueue(Action::apply(JobId::parse("J1").unwrap(), None))
            .await
            .unwrap();

        store.remove_by_id(queued.id).await.unwrap();
        store.remove_by_id(queued.id).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn undecodable_rows_are_reported_as_corrupt() {
        let store = SqliteActionStore::open_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO action_queue (id, action_type, payload, timestamp) VALUES (?1, 'archive', '{}', 0)",
        )
        .bind(ActionId::new().to_string())
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.list().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.db");

        let store = SqliteActionStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store.close().await;
        assert!(path.exists());
    }
}
