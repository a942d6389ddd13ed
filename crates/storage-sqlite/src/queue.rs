//! Durable sync queue: mutations recorded locally until they replay against
//! the remote store.

use chrono::Utc;
use log::debug;
use rusqlite::Connection;

use pulperia_core::sync::{SyncOperation, SyncQueueEntry, SyncQueueState, SyncQueueStatus};

use crate::db::LocalStore;
use crate::error::{Result, StorageError};

#[derive(Clone)]
pub struct SyncQueueRepository {
    store: LocalStore,
}

fn entry_from_sql_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncQueueEntry> {
    let operation: String = row.get("operation")?;
    let status: String = row.get("status")?;
    Ok(SyncQueueEntry {
        id: row.get("id")?,
        table_name: row.get("table_name")?,
        operation: SyncOperation::parse(&operation).unwrap_or(SyncOperation::Update),
        record_id: row.get("record_id")?,
        payload: row.get("payload")?,
        status: SyncQueueState::parse(&status).unwrap_or(SyncQueueState::Failed),
        error_message: row.get("error_message")?,
        retry_count: row.get("retry_count")?,
        created_at: row.get("created_at")?,
    })
}

impl SyncQueueRepository {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Record one pending mutation. Returns the entry id.
    pub async fn enqueue(
        &self,
        table: &str,
        operation: SyncOperation,
        record_id: &str,
        payload: String,
    ) -> Result<i64> {
        let table = table.to_string();
        let record_id = record_id.to_string();
        let created_at = Utc::now().to_rfc3339();
        self.store
            .exec(move |conn| {
                conn.execute(
                    "INSERT INTO sync_queue (table_name, operation, record_id, payload, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                    rusqlite::params![table, operation.as_str(), record_id, payload, created_at],
                )?;
                let id = conn.last_insert_rowid();
                debug!("queued {} {} for {}", operation.as_str(), record_id, table);
                Ok(id)
            })
            .await
    }

    /// Entries due for replay, in creation order (id breaks created_at
    /// ties). Failed entries keep retrying until they exhaust
    /// `max_retries`; beyond that only [`Self::discard_failed`] clears
    /// them.
    pub async fn due_in_order(&self, max_retries: i32, limit: u32) -> Result<Vec<SyncQueueEntry>> {
        self.store
            .exec(move |conn| {
                let mut statement = conn.prepare(
                    "SELECT * FROM sync_queue
                     WHERE status = 'pending'
                        OR (status = 'failed' AND retry_count < ?1)
                     ORDER BY created_at ASC, id ASC
                     LIMIT ?2",
                )?;
                let entries = statement
                    .query_map(rusqlite::params![max_retries, limit], |row| {
                        entry_from_sql_row(row)
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(entries)
            })
            .await
    }

    pub async fn mark_synced(&self, id: i64) -> Result<()> {
        self.store
            .exec(move |conn| {
                set_status(conn, id, SyncQueueState::Synced, None)?;
                Ok(())
            })
            .await
    }

    /// Mark the entry failed, keep the driver message and bump the retry
    /// counter.
    pub async fn mark_failed(&self, id: i64, message: &str) -> Result<()> {
        let message = message.to_string();
        self.store
            .exec(move |conn| {
                let changed = conn.execute(
                    "UPDATE sync_queue
                     SET status = 'failed', error_message = ?2, retry_count = retry_count + 1
                     WHERE id = ?1",
                    rusqlite::params![id, message],
                )?;
                if changed == 0 {
                    return Err(StorageError::InvalidArgument(format!(
                        "no queue entry {}",
                        id
                    )));
                }
                Ok(())
            })
            .await
    }

    /// Pending/synced/failed counts for the UI's sync indicator.
    pub async fn status(&self) -> Result<SyncQueueStatus> {
        self.store
            .exec(|conn| {
                let mut statement =
                    conn.prepare("SELECT status, COUNT(*) AS total FROM sync_queue GROUP BY status")?;
                let mut counts = SyncQueueStatus::default();
                let rows = statement.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;
                for row in rows {
                    let (status, total) = row?;
                    match SyncQueueState::parse(&status) {
                        Some(SyncQueueState::Pending) => counts.pending = total,
                        Some(SyncQueueState::Synced) => counts.synced = total,
                        Some(SyncQueueState::Failed) => counts.failed = total,
                        None => {}
                    }
                }
                Ok(counts)
            })
            .await
    }

    /// Drop all failed entries without replaying them. Explicit data loss;
    /// the call site is responsible for user confirmation.
    pub async fn discard_failed(&self) -> Result<u64> {
        self.store
            .exec(|conn| {
                let removed = conn.execute("DELETE FROM sync_queue WHERE status = 'failed'", [])?;
                Ok(removed as u64)
            })
            .await
    }

    /// Remove synced entries older than `before` (RFC 3339) so the queue
    /// table does not grow without bound.
    pub async fn purge_synced(&self, before: &str) -> Result<u64> {
        let before = before.to_string();
        self.store
            .exec(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM sync_queue WHERE status = 'synced' AND created_at < ?1",
                    [before],
                )?;
                Ok(removed as u64)
            })
            .await
    }
}

fn set_status(
    conn: &Connection,
    id: i64,
    status: SyncQueueState,
    message: Option<&str>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE sync_queue SET status = ?2, error_message = ?3 WHERE id = ?1",
        rusqlite::params![id, status.as_str(), message],
    )?;
    if changed == 0 {
        return Err(StorageError::InvalidArgument(format!(
            "no queue entry {}",
            id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> SyncQueueRepository {
        SyncQueueRepository::new(LocalStore::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn entries_replay_in_creation_order() {
        let queue = repository();
        let first = queue
            .enqueue("customers", SyncOperation::Insert, "c1", "{}".into())
            .await
            .unwrap();
        let second = queue
            .enqueue("customers", SyncOperation::Update, "c1", "{}".into())
            .await
            .unwrap();
        let third = queue
            .enqueue("products", SyncOperation::Insert, "p1", "{}".into())
            .await
            .unwrap();

        let due = queue.due_in_order(5, 100).await.unwrap();
        assert_eq!(
            due.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![first, second, third]
        );
    }

    #[tokio::test]
    async fn failed_entries_retry_until_exhausted() {
        let queue = repository();
        let id = queue
            .enqueue("sales", SyncOperation::Insert, "s1", "{}".into())
            .await
            .unwrap();

        queue.mark_failed(id, "remote rejected").await.unwrap();
        let due = queue.due_in_order(2, 100).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].retry_count, 1);
        assert_eq!(due[0].error_message.as_deref(), Some("remote rejected"));

        queue.mark_failed(id, "remote rejected again").await.unwrap();
        assert!(queue.due_in_order(2, 100).await.unwrap().is_empty());

        let counts = queue.status().await.unwrap();
        assert_eq!(counts.failed, 1);
        assert_eq!(queue.discard_failed().await.unwrap(), 1);
        assert_eq!(queue.status().await.unwrap().failed, 0);
    }

    #[tokio::test]
    async fn status_counts_by_state() {
        let queue = repository();
        let a = queue
            .enqueue("products", SyncOperation::Insert, "p1", "{}".into())
            .await
            .unwrap();
        queue
            .enqueue("products", SyncOperation::Insert, "p2", "{}".into())
            .await
            .unwrap();
        queue.mark_synced(a).await.unwrap();

        let counts = queue.status().await.unwrap();
        assert_eq!(
            (counts.pending, counts.synced, counts.failed),
            (1, 1, 0)
        );
    }
}
