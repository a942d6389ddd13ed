//! Realtime subscription bridge for the web admin.
//!
//! Tails the remote change feed and fans typed change events out to
//! per-table broadcast channels. Subscribers hold a [`Subscription`]
//! handle; dropping or explicitly releasing it removes the registration,
//! so no notification handler can leak past its view's lifetime. There is
//! no diffing; a subscriber reacts to any event for its table by
//! refetching its own query.

use log::{debug, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;

use pulperia_core::sync::{ChangeRow, SyncOperation};
use pulperia_remote::RemoteStore;

/// Event delivered to subscribers. Carries no row data on purpose;
/// consumers refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    pub table: String,
    pub operation: SyncOperation,
    pub record_id: String,
    pub seq: i64,
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub poll_interval: Duration,
    pub page_size: u32,
    /// Broadcast buffer per table; slow subscribers that fall further
    /// behind than this miss events and should refetch anyway.
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            page_size: 200,
            channel_capacity: 64,
        }
    }
}

struct TableChannel {
    sender: broadcast::Sender<TableChange>,
    subscribers: usize,
}

type ChannelMap = Arc<Mutex<HashMap<String, TableChannel>>>;

/// Cursor sentinel: feed position not yet established.
const CURSOR_UNSET: i64 = -1;

pub struct RealtimeBridge {
    remote: Arc<RemoteStore>,
    config: RealtimeConfig,
    channels: ChannelMap,
    cursor: AtomicI64,
    stop: Notify,
}

impl RealtimeBridge {
    pub fn new(remote: Arc<RemoteStore>, config: RealtimeConfig) -> Self {
        Self {
            remote,
            config,
            channels: Arc::new(Mutex::new(HashMap::new())),
            cursor: AtomicI64::new(CURSOR_UNSET),
            stop: Notify::new(),
        }
    }

    /// Register for changes to one table. The returned handle MUST be kept
    /// alive for as long as events are wanted and released when the owning
    /// view goes away.
    pub fn subscribe(&self, table: &str) -> Subscription {
        let mut channels = self.channels.lock().unwrap();
        let entry = channels.entry(table.to_string()).or_insert_with(|| {
            debug!("first subscriber for {}", table);
            TableChannel {
                sender: broadcast::channel(self.config.channel_capacity).0,
                subscribers: 0,
            }
        });
        entry.subscribers += 1;
        Subscription {
            table: table.to_string(),
            receiver: entry.sender.subscribe(),
            channels: Arc::clone(&self.channels),
            released: false,
        }
    }

    /// Route one batch of feed rows to the subscribed tables and advance
    /// the cursor.
    pub(crate) fn dispatch(&self, changes: Vec<ChangeRow>) {
        let channels = self.channels.lock().unwrap();
        for change in changes {
            self.cursor.fetch_max(change.seq, Ordering::SeqCst);
            if let Some(entry) = channels.get(&change.table_name) {
                // Send fails only when every receiver is gone; harmless.
                let _ = entry.sender.send(TableChange {
                    table: change.table_name.clone(),
                    operation: change.operation,
                    record_id: change.record_id.clone(),
                    seq: change.seq,
                });
            }
        }
    }

    async fn poll_once(&self) {
        let cursor = self.cursor.load(Ordering::SeqCst);
        if cursor == CURSOR_UNSET {
            // First poll: start at the feed head, history is not replayed.
            match self.remote.latest_seq().await {
                Ok(seq) => {
                    self.cursor.store(seq, Ordering::SeqCst);
                }
                Err(err) => {
                    warn!("could not establish feed cursor: {}", err);
                }
            }
            return;
        }

        match self.remote.feed_since(cursor, self.config.page_size).await {
            Ok(changes) if changes.is_empty() => {}
            Ok(changes) => self.dispatch(changes),
            Err(err) => debug!("feed poll failed: {}", err),
        }
    }

    /// Spawn the poll loop. Call [`Self::shutdown`] to stop it.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                bridge.poll_once().await;
                tokio::select! {
                    _ = bridge.stop.notified() => break,
                    _ = tokio::time::sleep(bridge.config.poll_interval) => {}
                }
            }
            debug!("realtime bridge stopped");
        })
    }

    pub fn shutdown(&self) {
        self.stop.notify_one();
    }

    #[cfg(test)]
    fn subscriber_count(&self, table: &str) -> usize {
        self.channels
            .lock()
            .unwrap()
            .get(table)
            .map(|entry| entry.subscribers)
            .unwrap_or(0)
    }
}

/// Live registration for one table. Release (or drop) to stop receiving.
pub struct Subscription {
    table: String,
    receiver: broadcast::Receiver<TableChange>,
    channels: ChannelMap,
    released: bool,
}

impl Subscription {
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Next change for this table. `None` once the bridge is gone. A
    /// subscriber that lagged past the channel capacity skips ahead; the
    /// contract is "something changed, refetch", so missed intermediate
    /// events are immaterial.
    pub async fn recv(&mut self) -> Option<TableChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("{} subscriber lagged {} events", self.table, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Explicit teardown.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut channels = self.channels.lock().unwrap();
        let now_empty = match channels.get_mut(&self.table) {
            Some(entry) => {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                entry.subscribers == 0
            }
            None => false,
        };
        if now_empty {
            channels.remove(&self.table);
            debug!("last subscriber for {} gone", self.table);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
