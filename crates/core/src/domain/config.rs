use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::get_str;
use crate::errors::Result;
use crate::gateway::Row;

/// USD→CRC exchange rate, stored as a decimal string.
pub const CONFIG_EXCHANGE_RATE: &str = "exchange_rate";
/// "1"/"0" toggle: whether sales decrement product stock.
pub const CONFIG_INVENTORY_CONTROL: &str = "inventory_control";
/// JSON-encoded [`BusinessProfile`].
pub const CONFIG_BUSINESS_PROFILE: &str = "business_profile";

/// A `{key, value}` system setting. Replicated like any other table;
/// conflicting writes resolve last-writer-wins at replay time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigItem {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl ConfigItem {
    pub const TABLE: &'static str = "config";

    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            key: get_str(row, "key")?,
            value: get_str(row, "value")?,
            updated_at: get_str(row, "updated_at")?,
        })
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("key".into(), Value::String(self.key.clone()));
        row.insert("value".into(), Value::String(self.value.clone()));
        row.insert("updated_at".into(), Value::String(self.updated_at.clone()));
        row
    }
}

/// Business identity printed on receipts and electronic invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfile {
    pub name: String,
    /// Cédula jurídica or física.
    pub legal_id: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub footer_message: Option<String>,
}
