use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{get_decimal, get_opt_decimal, get_opt_str, get_str, put_decimal, put_opt_decimal, put_opt_str};
use crate::errors::Result;
use crate::gateway::Row;

/// One register shift. `expected_amount` and `difference` are filled at
/// close time from the session's cash sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashSession {
    pub id: String,
    pub opened_at: String,
    pub closed_at: Option<String>,
    pub opening_amount: Decimal,
    pub counted_amount: Option<Decimal>,
    pub expected_amount: Option<Decimal>,
    pub difference: Option<Decimal>,
}

impl CashSession {
    pub const TABLE: &'static str = "cash_sessions";

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get_str(row, "id")?,
            opened_at: get_str(row, "opened_at")?,
            closed_at: get_opt_str(row, "closed_at")?,
            opening_amount: get_decimal(row, "opening_amount")?,
            counted_amount: get_opt_decimal(row, "counted_amount")?,
            expected_amount: get_opt_decimal(row, "expected_amount")?,
            difference: get_opt_decimal(row, "difference")?,
        })
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::String(self.id.clone()));
        row.insert("opened_at".into(), Value::String(self.opened_at.clone()));
        put_opt_str(&mut row, "closed_at", self.closed_at.as_deref());
        put_decimal(&mut row, "opening_amount", self.opening_amount);
        put_opt_decimal(&mut row, "counted_amount", self.counted_amount);
        put_opt_decimal(&mut row, "expected_amount", self.expected_amount);
        put_opt_decimal(&mut row, "difference", self.difference);
        row
    }
}
