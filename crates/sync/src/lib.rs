//! Offline/online synchronization engine.
//!
//! Wires the local store, the remote store, the connectivity monitor and
//! the sync queue into the single routing façade feature code talks to.
//!
//! The shell builds the pieces once at startup:
//!
//! ```rust,ignore
//! let local = LocalStore::open(db_path)?;
//! let remote = Arc::new(RemoteStore::new(&base_url, &api_key)?);
//! let monitor = Arc::new(ConnectivityMonitor::new(
//!     remote.clone(),
//!     ConnectivityConfig::default(),
//! ));
//! monitor.start();
//! let adapter = Arc::new(DatabaseAdapter::new(
//!     Some(local),
//!     remote,
//!     monitor,
//!     Capabilities::desktop(),
//!     SyncConfig::default(),
//! ));
//! let sales = SalesService::new(adapter.clone());
//! ```

mod adapter;
mod capabilities;
mod connectivity;
mod processor;
mod realtime;

pub use adapter::DatabaseAdapter;
pub use capabilities::Capabilities;
pub use connectivity::{ConnectivityConfig, ConnectivityMonitor, ReachabilityProbe};
pub use processor::{SyncConfig, SyncProcessor};
pub use realtime::{RealtimeBridge, RealtimeConfig, Subscription, TableChange};
