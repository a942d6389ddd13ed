//! Domain core for the pulpería point-of-sale system.
//!
//! Everything here is store-agnostic: record types with explicit row
//! mappings, the sync domain model, pure business math (IVA, barcodes,
//! tickets) and the feature services that drive the store through the
//! [`gateway::StoreGateway`] contract.

pub mod barcode;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod receipt;
pub mod services;
pub mod sync;
pub mod tax;

pub use errors::{Error, Result};
