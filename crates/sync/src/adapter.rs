//! The database adapter: single entry point for all feature code.
//!
//! Routes every operation to the local or remote store based on the
//! injected capabilities and the connectivity monitor, records local-only
//! writes in the sync queue, and falls back to the local store when the
//! remote becomes unreachable mid-write. Feature code never branches on
//! environment or connectivity itself.

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

use pulperia_core::gateway::{Filter, Row, RunResult, Select, StoreGateway, WriteOp};
use pulperia_core::sync::{
    is_replicated_table, primary_key_column, SyncCycleSummary, SyncOperation, SyncQueueStatus,
};
use pulperia_core::{Error, Result};
use pulperia_remote::RemoteStore;
use pulperia_storage_sqlite::{LocalStore, SyncQueueRepository};

use crate::capabilities::Capabilities;
use crate::connectivity::ConnectivityMonitor;
use crate::processor::{SyncConfig, SyncProcessor};

pub struct DatabaseAdapter {
    local: Option<LocalStore>,
    remote: Arc<RemoteStore>,
    monitor: Arc<ConnectivityMonitor>,
    capabilities: Capabilities,
    queue: Option<SyncQueueRepository>,
    processor: Option<SyncProcessor>,
}

impl DatabaseAdapter {
    /// Build the adapter once at startup and share it (`Arc`) with every
    /// feature service. `local` is `None` on the web admin.
    pub fn new(
        local: Option<LocalStore>,
        remote: Arc<RemoteStore>,
        monitor: Arc<ConnectivityMonitor>,
        capabilities: Capabilities,
        sync_config: SyncConfig,
    ) -> Self {
        let queue = local.clone().map(SyncQueueRepository::new);
        let processor = local
            .clone()
            .map(|store| SyncProcessor::new(store, Arc::clone(&remote), sync_config));
        Self {
            local,
            remote,
            monitor,
            capabilities,
            queue,
            processor,
        }
    }

    /// True when writes should land locally first: desktop shell, monitor
    /// says offline, and the local store opened successfully.
    fn offline_primary(&self) -> bool {
        self.capabilities.desktop_shell && !self.monitor.is_online() && self.local.is_some()
    }

    fn local_store(&self) -> Result<&LocalStore> {
        self.local
            .as_ref()
            .ok_or_else(|| Error::internal("local store is not available"))
    }

    fn queue_repo(&self) -> Result<&SyncQueueRepository> {
        self.queue
            .as_ref()
            .ok_or_else(|| Error::internal("sync queue requires the local store"))
    }

    fn check_replicated(table: &str) -> Result<()> {
        if is_replicated_table(table) {
            return Ok(());
        }
        Err(Error::query(format!("table '{}' is not replicated", table)))
    }

    fn record_id(table: &str, record: &Row) -> Result<String> {
        let pk = primary_key_column(table);
        record
            .get(pk)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::query(format!("record is missing primary key '{}'", pk)))
    }

    /// Queue payload for an update: the full row as it now stands locally,
    /// so replay upserts complete state instead of a partial patch.
    async fn full_row_or_patch(&self, table: &str, id: &str, patch: &Row) -> Result<String> {
        let pk = primary_key_column(table);
        let rows = self
            .local_store()?
            .select(
                Select::from(table)
                    .filter(Filter::eq(pk, id))
                    .limit(1),
            )
            .await
            .map_err(Error::from)?;
        let payload = match rows.into_iter().next() {
            Some(row) => row,
            None => {
                let mut fallback = patch.clone();
                fallback.insert(pk.to_string(), Value::String(id.to_string()));
                fallback
            }
        };
        Ok(serde_json::to_string(&Value::Object(payload))?)
    }

    async fn enqueue(&self, op: &WriteOp) -> Result<()> {
        let queue = self.queue_repo()?;
        match op {
            WriteOp::Insert { table, record } => {
                let id = Self::record_id(table, record)?;
                let payload = serde_json::to_string(&Value::Object(record.clone()))?;
                queue
                    .enqueue(table, SyncOperation::Insert, &id, payload)
                    .await
                    .map_err(Error::from)?;
            }
            WriteOp::Update { table, id, patch } => {
                let payload = self.full_row_or_patch(table, id, patch).await?;
                queue
                    .enqueue(table, SyncOperation::Update, id, payload)
                    .await
                    .map_err(Error::from)?;
            }
            WriteOp::Delete { table, id } => {
                let mut tombstone = Row::new();
                tombstone.insert(
                    primary_key_column(table).to_string(),
                    Value::String(id.clone()),
                );
                let payload = serde_json::to_string(&Value::Object(tombstone))?;
                queue
                    .enqueue(table, SyncOperation::Delete, id, payload)
                    .await
                    .map_err(Error::from)?;
            }
        }
        Ok(())
    }

    /// Whether a remote write failure should trigger the local fallback
    /// path instead of surfacing to the caller.
    fn should_fall_back(&self, err: &pulperia_remote::RemoteStoreError) -> bool {
        err.is_connection() && self.local.is_some()
    }

    async fn apply_local_and_enqueue(&self, op: WriteOp) -> Result<()> {
        let local = self.local_store()?;
        match &op {
            WriteOp::Insert { table, record } => {
                local.insert(table, record.clone()).await.map_err(Error::from)?
            }
            WriteOp::Update { table, id, patch } => local
                .update(table, id, patch.clone())
                .await
                .map_err(Error::from)?,
            WriteOp::Delete { table, id } => {
                local.delete(table, id).await.map_err(Error::from)?
            }
        }
        self.enqueue(&op).await
    }

    async fn apply_remote(&self, op: &WriteOp) -> std::result::Result<(), pulperia_remote::RemoteStoreError> {
        match op {
            WriteOp::Insert { table, record } => self.remote.insert(table, record).await,
            WriteOp::Update { table, id, patch } => self
                .remote
                .update(table, primary_key_column(table), id, patch)
                .await
                .map(|_| ()),
            WriteOp::Delete { table, id } => self
                .remote
                .delete(table, primary_key_column(table), id)
                .await
                .map(|_| ()),
        }
    }

    async fn write(&self, op: WriteOp) -> Result<()> {
        let table = match &op {
            WriteOp::Insert { table, record } => {
                Self::record_id(table, record)?;
                table
            }
            WriteOp::Update { table, .. } | WriteOp::Delete { table, .. } => table,
        };
        Self::check_replicated(table)?;

        if self.offline_primary() {
            return self.apply_local_and_enqueue(op).await;
        }

        match self.apply_remote(&op).await {
            Ok(()) => Ok(()),
            Err(err) if self.should_fall_back(&err) => {
                warn!("remote write failed, falling back to local: {}", err);
                self.apply_local_and_enqueue(op).await
            }
            Err(err) => Err(err.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sync surface
    // ─────────────────────────────────────────────────────────────────────

    /// Drain the queue against the remote store, then pull remote changes.
    /// A no-op on remote-only deployments.
    pub async fn sync_bidirectional(&self) -> Result<SyncCycleSummary> {
        match &self.processor {
            Some(processor) => processor.sync_bidirectional().await,
            None => {
                debug!("no local store, nothing to sync");
                Ok(SyncCycleSummary::default())
            }
        }
    }

    /// Discard failed queue entries. Explicit data loss; the call site asks
    /// the user first.
    pub async fn reset_queue(&self) -> Result<u64> {
        match &self.processor {
            Some(processor) => processor.reset_queue().await,
            None => Ok(0),
        }
    }

    /// Counts for the persistent sync indicator.
    pub async fn queue_status(&self) -> Result<SyncQueueStatus> {
        match &self.queue {
            Some(queue) => queue.status().await.map_err(Error::from),
            None => Ok(SyncQueueStatus::default()),
        }
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }
}

#[async_trait]
impl StoreGateway for DatabaseAdapter {
    /// Read routing only: results come from exactly one store, never a
    /// merge of both.
    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        if self.offline_primary() {
            self.local_store()?
                .query(sql, params)
                .await
                .map_err(Error::from)
        } else {
            self.remote.query(sql, &params).await.map_err(Error::from)
        }
    }

    async fn run(&self, sql: &str, params: Vec<Value>) -> Result<RunResult> {
        if self.offline_primary() {
            self.local_store()?
                .run(sql, params)
                .await
                .map_err(Error::from)
        } else {
            self.remote.run(sql, &params).await.map_err(Error::from)
        }
    }

    async fn select(&self, select: Select) -> Result<Vec<Row>> {
        if self.offline_primary() {
            self.local_store()?.select(select).await.map_err(Error::from)
        } else {
            self.remote.select(&select).await.map_err(Error::from)
        }
    }

    async fn insert(&self, table: &str, record: Row) -> Result<()> {
        self.write(WriteOp::Insert {
            table: table.to_string(),
            record,
        })
        .await
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<()> {
        self.write(WriteOp::Update {
            table: table.to_string(),
            id: id.to_string(),
            patch,
        })
        .await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        self.write(WriteOp::Delete {
            table: table.to_string(),
            id: id.to_string(),
        })
        .await
    }

    /// Atomic against the local store. Against the remote service the ops
    /// apply sequentially — its REST surface has no client transactions —
    /// matching the single-store guarantee the contract promises and no
    /// more.
    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<()> {
        for op in &ops {
            let table = match op {
                WriteOp::Insert { table, record } => {
                    Self::record_id(table, record)?;
                    table
                }
                WriteOp::Update { table, .. } | WriteOp::Delete { table, .. } => table,
            };
            Self::check_replicated(table)?;
        }

        if self.offline_primary() {
            self.local_store()?
                .apply_batch(ops.clone())
                .await
                .map_err(Error::from)?;
            for op in &ops {
                self.enqueue(op).await?;
            }
            return Ok(());
        }

        for (index, op) in ops.iter().enumerate() {
            match self.apply_remote(op).await {
                Ok(()) => {}
                Err(err) if self.should_fall_back(&err) => {
                    warn!(
                        "remote batch failed at op {}/{}, falling back to local: {}",
                        index + 1,
                        ops.len(),
                        err
                    );
                    // Ops already applied remotely replay later as
                    // idempotent upserts.
                    self.local_store()?
                        .apply_batch(ops.clone())
                        .await
                        .map_err(Error::from)?;
                    for op in &ops {
                        self.enqueue(op).await?;
                    }
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}
