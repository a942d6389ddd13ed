//! Per-table record types and their row mappings.
//!
//! Both stores move rows as column-name → JSON-value maps; every domain type
//! maps explicitly at the store boundary so schema drift between the two
//! stores surfaces as a mapping error instead of silent corruption.

mod cash_session;
mod config;
mod customer;
mod product;
mod sale;

pub use cash_session::CashSession;
pub use config::{BusinessProfile, ConfigItem, CONFIG_BUSINESS_PROFILE, CONFIG_EXCHANGE_RATE, CONFIG_INVENTORY_CONTROL};
pub use customer::Customer;
pub use product::Product;
pub use sale::{PaymentMethod, Sale, SaleItem};

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::errors::{Error, Result};
use crate::gateway::Row;

pub(crate) fn get_value<'a>(row: &'a Row, column: &str) -> Result<&'a Value> {
    row.get(column)
        .ok_or_else(|| Error::mapping(format!("missing column '{}'", column)))
}

pub(crate) fn get_str(row: &Row, column: &str) -> Result<String> {
    match get_value(row, column)? {
        Value::String(v) => Ok(v.clone()),
        other => Err(Error::mapping(format!(
            "column '{}' is not text: {}",
            column, other
        ))),
    }
}

pub(crate) fn get_opt_str(row: &Row, column: &str) -> Result<Option<String>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(other) => Err(Error::mapping(format!(
            "column '{}' is not text: {}",
            column, other
        ))),
    }
}

/// Money and quantities travel as strings so no store ever coerces them
/// through floating point.
pub(crate) fn get_decimal(row: &Row, column: &str) -> Result<Decimal> {
    match get_value(row, column)? {
        Value::String(v) => Decimal::from_str(v)
            .map_err(|e| Error::mapping(format!("column '{}': {}", column, e))),
        Value::Number(v) => Decimal::from_str(&v.to_string())
            .map_err(|e| Error::mapping(format!("column '{}': {}", column, e))),
        other => Err(Error::mapping(format!(
            "column '{}' is not numeric: {}",
            column, other
        ))),
    }
}

pub(crate) fn get_opt_decimal(row: &Row, column: &str) -> Result<Option<Decimal>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_decimal(row, column).map(Some),
    }
}

pub(crate) fn get_bool(row: &Row, column: &str) -> Result<bool> {
    match get_value(row, column)? {
        Value::Bool(v) => Ok(*v),
        Value::Number(v) => Ok(v.as_i64().unwrap_or(0) != 0),
        other => Err(Error::mapping(format!(
            "column '{}' is not boolean: {}",
            column, other
        ))),
    }
}

pub(crate) fn put_decimal(row: &mut Row, column: &str, value: Decimal) {
    row.insert(column.to_string(), Value::String(value.to_string()));
}

pub(crate) fn put_opt_decimal(row: &mut Row, column: &str, value: Option<Decimal>) {
    let json = match value {
        Some(v) => Value::String(v.to_string()),
        None => Value::Null,
    };
    row.insert(column.to_string(), json);
}

pub(crate) fn put_opt_str(row: &mut Row, column: &str, value: Option<&str>) {
    let json = match value {
        Some(v) => Value::String(v.to_string()),
        None => Value::Null,
    };
    row.insert(column.to_string(), json);
}
