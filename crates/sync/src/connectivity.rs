//! Connectivity monitor: a process-wide `Online`/`Offline` flag fed by
//! periodic reachability probes.
//!
//! Reads never block: the last-known state lives in a watch channel.
//! Subscribers are notified on transitions only; a probe that confirms
//! the current state is a no-op.

use async_trait::async_trait;
use log::{debug, info};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use pulperia_core::sync::ConnectivityState;
use pulperia_remote::RemoteStore;

/// A lightweight reachability check against the remote endpoint.
///
/// No distinction between "remote down" and "local network down"; both
/// collapse to `false`.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

#[async_trait]
impl ReachabilityProbe for RemoteStore {
    async fn check(&self) -> bool {
        self.health().await.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    /// Time between probes.
    pub interval: Duration,
    /// Deadline per probe; exceeding it counts as offline.
    pub probe_timeout: Duration,
    /// Random extra delay added to each interval so a fleet of terminals
    /// does not probe in lockstep.
    pub max_jitter: Duration,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(5),
            max_jitter: Duration::from_secs(2),
        }
    }
}

pub struct ConnectivityMonitor {
    probe: Arc<dyn ReachabilityProbe>,
    config: ConnectivityConfig,
    state: watch::Sender<ConnectivityState>,
    stop: Notify,
}

impl ConnectivityMonitor {
    /// Starts out `Offline` until the first probe says otherwise.
    pub fn new(probe: Arc<dyn ReachabilityProbe>, config: ConnectivityConfig) -> Self {
        let (state, _) = watch::channel(ConnectivityState::Offline);
        Self {
            probe,
            config,
            state,
            stop: Notify::new(),
        }
    }

    /// Last-known state, synchronously.
    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Watch transitions. The receiver sees state changes only, never
    /// duplicate same-state notifications.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Run one probe and apply the result. Returns the resulting state.
    pub async fn probe_once(&self) -> ConnectivityState {
        let reachable = tokio::time::timeout(self.config.probe_timeout, self.probe.check())
            .await
            .unwrap_or(false);
        let next = if reachable {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        };
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            info!("connectivity changed: {:?}", next);
        }
        next
    }

    /// Spawn the periodic probe loop. Call [`Self::shutdown`] to stop it.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                monitor.probe_once().await;
                let jitter_ms = if monitor.config.max_jitter.is_zero() {
                    0
                } else {
                    rand::thread_rng()
                        .gen_range(0..=monitor.config.max_jitter.as_millis() as u64)
                };
                let delay = monitor.config.interval + Duration::from_millis(jitter_ms);
                tokio::select! {
                    _ = monitor.stop.notified() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            debug!("connectivity monitor stopped");
        })
    }

    pub fn shutdown(&self) {
        self.stop.notify_one();
    }
}
