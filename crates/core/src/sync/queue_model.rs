//! Sync domain model: replicated-table registry, queue entries, statuses.

use serde::{Deserialize, Serialize};

/// Canonical list of tables replicated between the local and remote stores.
///
/// `sync_queue` and `sync_checkpoint` are local-only bookkeeping and must
/// never appear here.
pub const REPLICATED_TABLES: [&str; 6] = [
    "products",
    "customers",
    "sales",
    "sale_items",
    "cash_sessions",
    "config",
];

/// True when `table` participates in replication.
pub fn is_replicated_table(table: &str) -> bool {
    REPLICATED_TABLES.contains(&table)
}

/// Primary-key column for a replicated table.
pub fn primary_key_column(table: &str) -> &'static str {
    match table {
        "config" => "key",
        _ => "id",
    }
}

/// Mutation kinds recorded in the sync queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Insert,
    Update,
    Delete,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Queue entry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncQueueState {
    Pending,
    Synced,
    Failed,
}

impl SyncQueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A pending mutation recorded while writes could not reach the remote store.
///
/// Entries replay in ascending `created_at` order (entry `id` breaks ties)
/// so that later writes to a record never lose to earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueEntry {
    pub id: i64,
    pub table_name: String,
    pub operation: SyncOperation,
    pub record_id: String,
    /// Serialized column map. Full row for inserts/updates; `{pk: id}` for
    /// deletes.
    pub payload: String,
    pub status: SyncQueueState,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: String,
}

/// Pending/synced/failed counts surfaced by the UI's sync indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueStatus {
    pub pending: i64,
    pub synced: i64,
    pub failed: i64,
}

/// Process-wide reachability state published by the connectivity monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Outcome of one bidirectional sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCycleSummary {
    pub pushed: usize,
    pub pulled: usize,
    pub failed: usize,
    pub duration_ms: i64,
}

/// A row from the remote change feed, consumed by the pull phase and the
/// realtime bridge. Field names match the feed's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRow {
    pub seq: i64,
    pub table_name: String,
    pub operation: SyncOperation,
    pub record_id: String,
    /// Full row for inserts/updates; absent for delete tombstones.
    #[serde(default)]
    pub payload: Option<serde_json::Map<String, serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_tables_are_not_replicated() {
        assert!(!is_replicated_table("sync_queue"));
        assert!(!is_replicated_table("sync_checkpoint"));
        assert!(is_replicated_table("products"));
        assert!(is_replicated_table("config"));
    }

    #[test]
    fn config_uses_key_as_primary_key() {
        assert_eq!(primary_key_column("config"), "key");
        assert_eq!(primary_key_column("sales"), "id");
    }

    #[test]
    fn operation_round_trips_through_db_strings() {
        for op in [
            SyncOperation::Insert,
            SyncOperation::Update,
            SyncOperation::Delete,
        ] {
            assert_eq!(SyncOperation::parse(op.as_str()), Some(op));
        }
        assert_eq!(SyncOperation::parse("upsert"), None);
    }
}
