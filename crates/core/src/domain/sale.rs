use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{get_decimal, get_opt_decimal, get_opt_str, get_str, put_decimal, put_opt_decimal, put_opt_str};
use crate::errors::{Error, Result};
use crate::gateway::Row;
use crate::tax::TaxRate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// SINPE Móvil transfer.
    Sinpe,
    /// On account ("fiado"); requires a customer.
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Sinpe => "sinpe",
            Self::Credit => "credit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "sinpe" => Some(Self::Sinpe),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }
}

/// A completed sale header. `subtotal` is the IVA-exclusive base; `total`
/// is what the customer paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub customer_id: Option<String>,
    pub cash_session_id: Option<String>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub amount_paid: Option<Decimal>,
    pub change_due: Option<Decimal>,
    pub created_at: String,
}

impl Sale {
    pub const TABLE: &'static str = "sales";

    pub fn from_row(row: &Row) -> Result<Self> {
        let method_code = get_str(row, "payment_method")?;
        let payment_method = PaymentMethod::parse(&method_code)
            .ok_or_else(|| Error::mapping(format!("unknown payment method '{}'", method_code)))?;
        Ok(Self {
            id: get_str(row, "id")?,
            customer_id: get_opt_str(row, "customer_id")?,
            cash_session_id: get_opt_str(row, "cash_session_id")?,
            subtotal: get_decimal(row, "subtotal")?,
            tax_total: get_decimal(row, "tax_total")?,
            total: get_decimal(row, "total")?,
            payment_method,
            amount_paid: get_opt_decimal(row, "amount_paid")?,
            change_due: get_opt_decimal(row, "change_due")?,
            created_at: get_str(row, "created_at")?,
        })
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::String(self.id.clone()));
        put_opt_str(&mut row, "customer_id", self.customer_id.as_deref());
        put_opt_str(&mut row, "cash_session_id", self.cash_session_id.as_deref());
        put_decimal(&mut row, "subtotal", self.subtotal);
        put_decimal(&mut row, "tax_total", self.tax_total);
        put_decimal(&mut row, "total", self.total);
        row.insert(
            "payment_method".into(),
            Value::String(self.payment_method.as_str().into()),
        );
        put_opt_decimal(&mut row, "amount_paid", self.amount_paid);
        put_opt_decimal(&mut row, "change_due", self.change_due);
        row.insert("created_at".into(), Value::String(self.created_at.clone()));
        row
    }
}

/// One line of a sale. `unit_price` is tax-inclusive, matching the shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: TaxRate,
}

impl SaleItem {
    pub const TABLE: &'static str = "sale_items";

    pub fn from_row(row: &Row) -> Result<Self> {
        let tax_code = get_str(row, "tax_rate")?;
        let tax_rate = TaxRate::parse(&tax_code)
            .ok_or_else(|| Error::mapping(format!("unknown tax rate '{}'", tax_code)))?;
        Ok(Self {
            id: get_str(row, "id")?,
            sale_id: get_str(row, "sale_id")?,
            product_id: get_str(row, "product_id")?,
            description: get_str(row, "description")?,
            quantity: get_decimal(row, "quantity")?,
            unit_price: get_decimal(row, "unit_price")?,
            tax_rate,
        })
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::String(self.id.clone()));
        row.insert("sale_id".into(), Value::String(self.sale_id.clone()));
        row.insert("product_id".into(), Value::String(self.product_id.clone()));
        row.insert("description".into(), Value::String(self.description.clone()));
        put_decimal(&mut row, "quantity", self.quantity);
        put_decimal(&mut row, "unit_price", self.unit_price);
        row.insert("tax_rate".into(), Value::String(self.tax_rate.as_str().into()));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sale_row_mapping_round_trips() {
        let sale = Sale {
            id: "s1".into(),
            customer_id: None,
            cash_session_id: Some("cs1".into()),
            subtotal: dec!(1000.00),
            tax_total: dec!(130.00),
            total: dec!(1130),
            payment_method: PaymentMethod::Cash,
            amount_paid: Some(dec!(2000)),
            change_due: Some(dec!(870)),
            created_at: "2026-03-01T15:30:00+00:00".into(),
        };
        let row = sale.to_row();
        assert_eq!(Sale::from_row(&row).unwrap(), sale);
    }

    #[test]
    fn unknown_payment_method_is_rejected() {
        let mut row = Row::new();
        row.insert("payment_method".into(), Value::String("cheque".into()));
        assert!(Sale::from_row(&row).is_err());
    }
}
