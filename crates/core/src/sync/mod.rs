//! Sync domain models shared by the storage, remote and engine crates.

mod queue_model;

pub use queue_model::*;
