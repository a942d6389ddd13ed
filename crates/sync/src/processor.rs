//! Sync queue processor: drains pending local mutations against the remote
//! store (push), then applies the remote change feed locally (pull).

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

use pulperia_core::gateway::Row;
use pulperia_core::sync::{SyncCycleSummary, SyncOperation, SyncQueueStatus, REPLICATED_TABLES};
use pulperia_core::{Error, Result};
use pulperia_remote::RemoteStore;
use pulperia_storage_sqlite::{CheckpointRepository, LocalStore, SyncQueueRepository};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upper bound on entries replayed in one push phase, so a long queue
    /// cannot pin the periodic timer.
    pub max_entries_per_cycle: u32,
    /// Failed entries stop retrying after this many attempts; only
    /// `reset_queue` clears them afterwards.
    pub max_retries: i32,
    /// Change-feed page size for the pull phase.
    pub pull_page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_entries_per_cycle: 500,
            max_retries: 5,
            pull_page_size: 200,
        }
    }
}

pub struct SyncProcessor {
    local: LocalStore,
    remote: Arc<RemoteStore>,
    queue: SyncQueueRepository,
    checkpoints: CheckpointRepository,
    config: SyncConfig,
}

impl SyncProcessor {
    pub fn new(local: LocalStore, remote: Arc<RemoteStore>, config: SyncConfig) -> Self {
        let queue = SyncQueueRepository::new(local.clone());
        let checkpoints = CheckpointRepository::new(local.clone());
        Self {
            local,
            remote,
            queue,
            checkpoints,
            config,
        }
    }

    pub fn queue(&self) -> &SyncQueueRepository {
        &self.queue
    }

    /// One full cycle: push then pull. A connection failure mid-cycle ends
    /// the cycle early and leaves the remaining work for the next one; it
    /// is not an error.
    pub async fn sync_bidirectional(&self) -> Result<SyncCycleSummary> {
        let started = Instant::now();
        let mut summary = SyncCycleSummary::default();

        let connected = self.push(&mut summary).await?;
        if connected {
            self.pull(&mut summary).await?;
        }

        summary.duration_ms = started.elapsed().as_millis() as i64;
        info!(
            "sync cycle: pushed={} pulled={} failed={} in {}ms",
            summary.pushed, summary.pulled, summary.failed, summary.duration_ms
        );
        Ok(summary)
    }

    /// Replay queued mutations in creation order. Returns `false` when the
    /// remote became unreachable and the cycle should stop.
    async fn push(&self, summary: &mut SyncCycleSummary) -> Result<bool> {
        let entries = self
            .queue
            .due_in_order(self.config.max_retries, self.config.max_entries_per_cycle)
            .await
            .map_err(Error::from)?;

        for entry in entries {
            let payload: Row = match serde_json::from_str(&entry.payload) {
                Ok(payload) => payload,
                Err(err) => {
                    // Unparseable payloads can never succeed; fail them
                    // without burning a network round-trip.
                    self.queue
                        .mark_failed(entry.id, &format!("invalid payload: {}", err))
                        .await
                        .map_err(Error::from)?;
                    summary.failed += 1;
                    continue;
                }
            };

            match self
                .remote
                .replay(&entry.table_name, entry.operation, &entry.record_id, &payload)
                .await
            {
                Ok(()) => {
                    self.queue.mark_synced(entry.id).await.map_err(Error::from)?;
                    summary.pushed += 1;
                }
                Err(err) if err.is_connection() => {
                    // Mid-batch disconnect: everything not yet replayed
                    // stays pending for the next cycle.
                    debug!("push interrupted, remote unreachable: {}", err);
                    return Ok(false);
                }
                Err(err) => {
                    warn!(
                        "queue entry {} ({} {}) rejected: {}",
                        entry.id,
                        entry.operation.as_str(),
                        entry.table_name,
                        err
                    );
                    self.queue
                        .mark_failed(entry.id, &err.to_string())
                        .await
                        .map_err(Error::from)?;
                    summary.failed += 1;
                }
            }
        }
        Ok(true)
    }

    /// Apply remote changes newer than each table's checkpoint. Rows
    /// upsert by primary key; delete tombstones remove by primary key.
    async fn pull(&self, summary: &mut SyncCycleSummary) -> Result<()> {
        for table in REPLICATED_TABLES {
            let mut checkpoint = self.checkpoints.last_seq(table).await.map_err(Error::from)?;
            loop {
                let changes = match self
                    .remote
                    .changes_since(table, checkpoint, self.config.pull_page_size)
                    .await
                {
                    Ok(changes) => changes,
                    Err(err) if err.is_connection() => {
                        debug!("pull interrupted, remote unreachable: {}", err);
                        return Ok(());
                    }
                    Err(err) => return Err(err.into()),
                };
                if changes.is_empty() {
                    break;
                }
                let page_len = changes.len();

                for change in changes {
                    if change.seq <= checkpoint {
                        continue;
                    }
                    match change.operation {
                        SyncOperation::Delete => {
                            self.local
                                .delete(table, &change.record_id)
                                .await
                                .map_err(Error::from)?;
                        }
                        SyncOperation::Insert | SyncOperation::Update => match change.payload {
                            Some(payload) => {
                                self.local
                                    .upsert(table, payload)
                                    .await
                                    .map_err(Error::from)?;
                            }
                            None => {
                                warn!(
                                    "feed entry {} for {} has no payload, skipping",
                                    change.seq, table
                                );
                            }
                        },
                    }
                    checkpoint = change.seq;
                    summary.pulled += 1;
                }

                self.checkpoints
                    .advance(table, checkpoint)
                    .await
                    .map_err(Error::from)?;
                if page_len < self.config.pull_page_size as usize {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Discard failed entries without replaying them. Explicit data loss;
    /// callers confirm with the user first.
    pub async fn reset_queue(&self) -> Result<u64> {
        let removed = self.queue.discard_failed().await.map_err(Error::from)?;
        if removed > 0 {
            info!("discarded {} failed queue entries", removed);
        }
        Ok(removed)
    }

    pub async fn queue_status(&self) -> Result<SyncQueueStatus> {
        self.queue.status().await.map_err(Error::from)
    }
}
