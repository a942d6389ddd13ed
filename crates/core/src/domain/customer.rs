use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{get_decimal, get_opt_str, get_str, put_decimal, put_opt_str};
use crate::errors::Result;
use crate::gateway::Row;

/// A tracked customer. `credit_balance` is the outstanding "fiado" amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub credit_balance: Decimal,
    pub updated_at: String,
}

impl Customer {
    pub const TABLE: &'static str = "customers";

    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: get_str(row, "id")?,
            name: get_str(row, "name")?,
            phone: get_opt_str(row, "phone")?,
            email: get_opt_str(row, "email")?,
            credit_balance: get_decimal(row, "credit_balance")?,
            updated_at: get_str(row, "updated_at")?,
        })
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::String(self.id.clone()));
        row.insert("name".into(), Value::String(self.name.clone()));
        put_opt_str(&mut row, "phone", self.phone.as_deref());
        put_opt_str(&mut row, "email", self.email.as_deref());
        put_decimal(&mut row, "credit_balance", self.credit_balance);
        row.insert("updated_at".into(), Value::String(self.updated_at.clone()));
        row
    }
}
