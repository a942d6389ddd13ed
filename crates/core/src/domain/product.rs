use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{get_bool, get_decimal, get_opt_decimal, get_opt_str, get_str, put_decimal, put_opt_decimal, put_opt_str};
use crate::errors::Result;
use crate::gateway::Row;
use crate::tax::TaxRate;

/// A shelf product. `price` is the tax-inclusive shelf price in colones;
/// `stock` carries three decimals for weighted items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub barcode: Option<String>,
    pub price: Decimal,
    pub cost: Option<Decimal>,
    pub stock: Decimal,
    pub tax_rate: TaxRate,
    pub active: bool,
    pub updated_at: String,
}

impl Product {
    pub const TABLE: &'static str = "products";

    pub fn from_row(row: &Row) -> Result<Self> {
        let tax_code = get_str(row, "tax_rate")?;
        let tax_rate = TaxRate::parse(&tax_code).ok_or_else(|| {
            crate::errors::Error::mapping(format!("unknown tax rate '{}'", tax_code))
        })?;
        Ok(Self {
            id: get_str(row, "id")?,
            name: get_str(row, "name")?,
            barcode: get_opt_str(row, "barcode")?,
            price: get_decimal(row, "price")?,
            cost: get_opt_decimal(row, "cost")?,
            stock: get_decimal(row, "stock")?,
            tax_rate,
            active: get_bool(row, "active")?,
            updated_at: get_str(row, "updated_at")?,
        })
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::String(self.id.clone()));
        row.insert("name".into(), Value::String(self.name.clone()));
        put_opt_str(&mut row, "barcode", self.barcode.as_deref());
        put_decimal(&mut row, "price", self.price);
        put_opt_decimal(&mut row, "cost", self.cost);
        put_decimal(&mut row, "stock", self.stock);
        row.insert("tax_rate".into(), Value::String(self.tax_rate.as_str().into()));
        row.insert("active".into(), Value::from(i64::from(self.active)));
        row.insert("updated_at".into(), Value::String(self.updated_at.clone()));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn row_mapping_round_trips() {
        let product = Product {
            id: "p1".into(),
            name: "Arroz Tío Pelón 1kg".into(),
            barcode: Some("7441001600012".into()),
            price: dec!(1250),
            cost: Some(dec!(980.50)),
            stock: dec!(14),
            tax_rate: TaxRate::Reduced1,
            active: true,
            updated_at: "2026-03-01T12:00:00+00:00".into(),
        };
        let row = product.to_row();
        assert_eq!(Product::from_row(&row).unwrap(), product);
    }

    #[test]
    fn missing_column_is_a_mapping_error() {
        let mut row = Product {
            id: "p1".into(),
            name: "Caja fósforos".into(),
            barcode: None,
            price: dec!(200),
            cost: None,
            stock: dec!(0),
            tax_rate: TaxRate::General,
            active: true,
            updated_at: "2026-03-01T12:00:00+00:00".into(),
        }
        .to_row();
        row.remove("price");
        assert!(Product::from_row(&row).is_err());
    }
}
