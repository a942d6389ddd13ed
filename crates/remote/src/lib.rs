//! Remote store client: the hosted relational database service used as the
//! system of record whenever the terminal is connected.

mod client;
mod error;
mod sql;

pub use client::RemoteStore;
pub use error::{RemoteStoreError, Result, RetryClass};
pub use sql::{bind_statement, BoundStatement};
