//! SQLite-backed local store for the desktop terminal.
//!
//! Owns the embedded database file, the bundled schema, the durable sync
//! queue and the pull checkpoints.

mod checkpoint;
mod db;
mod error;
mod queue;

pub use checkpoint::CheckpointRepository;
pub use db::{default_database_path, LocalStore};
pub use error::{Result, StorageError};
pub use queue::SyncQueueRepository;
