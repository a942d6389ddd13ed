use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::Product;
use crate::errors::{Error, Result};
use crate::gateway::{Filter, Select, StoreGateway};
use crate::tax::TaxRate;

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub barcode: Option<String>,
    pub price: Decimal,
    pub cost: Option<Decimal>,
    pub stock: Decimal,
    pub tax_rate: TaxRate,
}

pub struct ProductsService {
    store: Arc<dyn StoreGateway>,
}

impl ProductsService {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_product: NewProduct) -> Result<Product> {
        if new_product.price < Decimal::ZERO {
            return Err(Error::validation("price cannot be negative"));
        }
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new_product.name,
            barcode: new_product.barcode,
            price: new_product.price,
            cost: new_product.cost,
            stock: new_product.stock,
            tax_rate: new_product.tax_rate,
            active: true,
            updated_at: Utc::now().to_rfc3339(),
        };
        self.store.insert(Product::TABLE, product.to_row()).await?;
        Ok(product)
    }

    pub async fn update(&self, mut product: Product) -> Result<Product> {
        product.updated_at = Utc::now().to_rfc3339();
        self.store
            .update(Product::TABLE, &product.id.clone(), product.to_row())
            .await?;
        Ok(product)
    }

    pub async fn get(&self, id: &str) -> Result<Product> {
        let rows = self
            .store
            .select(
                Select::from(Product::TABLE)
                    .filter(Filter::eq("id", id))
                    .limit(1),
            )
            .await?;
        let row = rows.first().ok_or_else(|| Error::NotFound {
            entity: "product",
            id: id.to_string(),
        })?;
        Product::from_row(row)
    }

    pub async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let rows = self
            .store
            .select(
                Select::from(Product::TABLE)
                    .filter(Filter::eq("barcode", barcode))
                    .limit(1),
            )
            .await?;
        rows.first().map(Product::from_row).transpose()
    }

    pub async fn list_active(&self) -> Result<Vec<Product>> {
        let rows = self
            .store
            .select(
                Select::from(Product::TABLE)
                    .filter(Filter::eq("active", 1))
                    .order_by("name", false),
            )
            .await?;
        rows.iter().map(Product::from_row).collect()
    }

    /// Remove a product that has never been sold; products with sales
    /// history are deactivated instead so old tickets keep resolving.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let referenced = self
            .store
            .select(
                Select::from("sale_items")
                    .filter(Filter::eq("product_id", id))
                    .limit(1),
            )
            .await?;
        if !referenced.is_empty() {
            return Err(Error::validation(
                "product has sales history; deactivate it instead",
            ));
        }
        self.store.delete(Product::TABLE, id).await
    }

    pub async fn deactivate(&self, id: &str) -> Result<()> {
        let mut product = self.get(id).await?;
        product.active = false;
        self.update(product).await.map(|_| ())
    }
}
