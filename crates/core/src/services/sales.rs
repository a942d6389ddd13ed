use chrono::Utc;
use log::warn;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Customer, PaymentMethod, Product, Sale, SaleItem};
use crate::errors::{Error, Result};
use crate::gateway::{Filter, Select, StoreGateway, WriteOp};
use crate::services::SettingsService;
use crate::tax::{TaxBreakdown, TaxableLine};

#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub lines: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    /// Required for cash payments.
    pub amount_paid: Option<Decimal>,
    /// Required for credit ("fiado") sales.
    pub customer_id: Option<String>,
    pub cash_session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompletedSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub breakdown: TaxBreakdown,
}

pub struct SalesService {
    store: Arc<dyn StoreGateway>,
    settings: SettingsService,
}

impl SalesService {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        let settings = SettingsService::new(store.clone());
        Self { store, settings }
    }

    async fn load_product(&self, id: &str) -> Result<Product> {
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

    async fn load_customer(&self, id: &str) -> Result<Customer> {
        let rows = self
            .store
            .select(
                Select::from(Customer::TABLE)
                    .filter(Filter::eq("id", id))
                    .limit(1),
            )
            .await?;
        let row = rows.first().ok_or_else(|| Error::NotFound {
            entity: "customer",
            id: id.to_string(),
        })?;
        Customer::from_row(row)
    }

    /// Price the cart, persist the sale header, its items, stock decrements
    /// and credit charge in one batch against the primary store.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CompletedSale> {
        if request.lines.is_empty() {
            return Err(Error::validation("cart is empty"));
        }

        let sale_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut products = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            if line.quantity <= Decimal::ZERO {
                return Err(Error::validation("line quantity must be positive"));
            }
            products.push(self.load_product(&line.product_id).await?);
        }

        let taxable: Vec<TaxableLine> = request
            .lines
            .iter()
            .zip(&products)
            .map(|(line, product)| TaxableLine {
                unit_price: product.price,
                quantity: line.quantity,
                rate: product.tax_rate,
            })
            .collect();
        let breakdown = TaxBreakdown::for_lines(&taxable);

        let (amount_paid, change_due) = match request.payment_method {
            PaymentMethod::Cash => {
                let paid = request
                    .amount_paid
                    .ok_or_else(|| Error::validation("cash sale requires amount paid"))?;
                if paid < breakdown.total {
                    return Err(Error::validation(format!(
                        "paid {} is less than total {}",
                        paid, breakdown.total
                    )));
                }
                (Some(paid), Some(paid - breakdown.total))
            }
            PaymentMethod::Credit => {
                if request.customer_id.is_none() {
                    return Err(Error::validation("credit sale requires a customer"));
                }
                (None, None)
            }
            PaymentMethod::Card | PaymentMethod::Sinpe => (Some(breakdown.total), None),
        };

        let sale = Sale {
            id: sale_id.clone(),
            customer_id: request.customer_id.clone(),
            cash_session_id: request.cash_session_id.clone(),
            subtotal: breakdown.subtotal,
            tax_total: breakdown.tax_total,
            total: breakdown.total,
            payment_method: request.payment_method,
            amount_paid,
            change_due,
            created_at: now.clone(),
        };

        let items: Vec<SaleItem> = request
            .lines
            .iter()
            .zip(&products)
            .map(|(line, product)| SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: product.id.clone(),
                description: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.price,
                tax_rate: product.tax_rate,
            })
            .collect();

        let mut ops = Vec::with_capacity(2 + items.len() * 2);
        ops.push(WriteOp::Insert {
            table: Sale::TABLE.to_string(),
            record: sale.to_row(),
        });
        for item in &items {
            ops.push(WriteOp::Insert {
                table: SaleItem::TABLE.to_string(),
                record: item.to_row(),
            });
        }

        if self.settings.inventory_control_enabled().await? {
            for (line, product) in request.lines.iter().zip(&products) {
                let remaining = product.stock - line.quantity;
                if remaining < Decimal::ZERO {
                    warn!(
                        "product {} stock going negative ({} - {})",
                        product.id, product.stock, line.quantity
                    );
                }
                let mut patch = crate::gateway::Row::new();
                patch.insert("stock".into(), remaining.to_string().into());
                patch.insert("updated_at".into(), now.clone().into());
                ops.push(WriteOp::Update {
                    table: Product::TABLE.to_string(),
                    id: product.id.clone(),
                    patch,
                });
            }
        }

        if request.payment_method == PaymentMethod::Credit {
            let customer_id = request
                .customer_id
                .as_deref()
                .ok_or_else(|| Error::validation("credit sale requires a customer"))?;
            let customer = self.load_customer(customer_id).await?;
            let mut patch = crate::gateway::Row::new();
            patch.insert(
                "credit_balance".into(),
                (customer.credit_balance + breakdown.total).to_string().into(),
            );
            patch.insert("updated_at".into(), now.clone().into());
            ops.push(WriteOp::Update {
                table: Customer::TABLE.to_string(),
                id: customer_id.to_string(),
                patch,
            });
        }

        self.store.transaction(ops).await?;
        Ok(CompletedSale {
            sale,
            items,
            breakdown,
        })
    }

    pub async fn get(&self, id: &str) -> Result<(Sale, Vec<SaleItem>)> {
        let rows = self
            .store
            .select(Select::from(Sale::TABLE).filter(Filter::eq("id", id)).limit(1))
            .await?;
        let sale_row = rows.first().ok_or_else(|| Error::NotFound {
            entity: "sale",
            id: id.to_string(),
        })?;
        let sale = Sale::from_row(sale_row)?;

        let item_rows = self
            .store
            .select(Select::from(SaleItem::TABLE).filter(Filter::eq("sale_id", id)))
            .await?;
        let items = item_rows
            .iter()
            .map(SaleItem::from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((sale, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::MemoryGateway;
    use crate::services::{NewCustomer, NewProduct};
    use crate::services::{CustomersService, ProductsService};
    use crate::tax::TaxRate;
    use rust_decimal_macros::dec;

    async fn seed_product(store: &Arc<MemoryGateway>, price: Decimal, stock: Decimal) -> Product {
        ProductsService::new(store.clone())
            .create(NewProduct {
                name: "Leche 1L".into(),
                barcode: None,
                price,
                cost: None,
                stock,
                tax_rate: TaxRate::Reduced1,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn cash_checkout_decrements_stock_and_computes_change() {
        let store = Arc::new(MemoryGateway::new());
        let product = seed_product(&store, dec!(1010), dec!(5)).await;
        let service = SalesService::new(store.clone());

        let completed = service
            .checkout(CheckoutRequest {
                lines: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: dec!(2),
                }],
                payment_method: PaymentMethod::Cash,
                amount_paid: Some(dec!(5000)),
                customer_id: None,
                cash_session_id: None,
            })
            .await
            .unwrap();

        assert_eq!(completed.sale.total, dec!(2020.00));
        assert_eq!(completed.sale.change_due, Some(dec!(2980.00)));
        assert_eq!(completed.items.len(), 1);

        let row = store.row(Product::TABLE, &product.id).unwrap();
        assert_eq!(row.get("stock").and_then(|v| v.as_str()), Some("3"));
        assert_eq!(store.len(Sale::TABLE), 1);
        assert_eq!(store.len(SaleItem::TABLE), 1);
    }

    #[tokio::test]
    async fn disabled_inventory_control_skips_stock_updates() {
        let store = Arc::new(MemoryGateway::new());
        let product = seed_product(&store, dec!(500), dec!(5)).await;
        SettingsService::new(store.clone())
            .set_inventory_control(false)
            .await
            .unwrap();
        let service = SalesService::new(store.clone());

        service
            .checkout(CheckoutRequest {
                lines: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: dec!(1),
                }],
                payment_method: PaymentMethod::Card,
                amount_paid: None,
                customer_id: None,
                cash_session_id: None,
            })
            .await
            .unwrap();

        let row = store.row(Product::TABLE, &product.id).unwrap();
        assert_eq!(row.get("stock").and_then(|v| v.as_str()), Some("5"));
    }

    #[tokio::test]
    async fn credit_sale_requires_customer_and_charges_balance() {
        let store = Arc::new(MemoryGateway::new());
        let product = seed_product(&store, dec!(1000), dec!(10)).await;
        let customer = CustomersService::new(store.clone())
            .create(NewCustomer {
                name: "Ana".into(),
                phone: None,
                email: None,
            })
            .await
            .unwrap();
        let service = SalesService::new(store.clone());

        let no_customer = service
            .checkout(CheckoutRequest {
                lines: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: dec!(1),
                }],
                payment_method: PaymentMethod::Credit,
                amount_paid: None,
                customer_id: None,
                cash_session_id: None,
            })
            .await;
        assert!(matches!(no_customer, Err(Error::Validation(_))));

        service
            .checkout(CheckoutRequest {
                lines: vec![CartLine {
                    product_id: product.id.clone(),
                    quantity: dec!(1),
                }],
                payment_method: PaymentMethod::Credit,
                amount_paid: None,
                customer_id: Some(customer.id.clone()),
                cash_session_id: None,
            })
            .await
            .unwrap();

        let row = store.row(Customer::TABLE, &customer.id).unwrap();
        assert_eq!(
            row.get("credit_balance").and_then(|v| v.as_str()),
            Some("1000")
        );
    }

    #[tokio::test]
    async fn underpayment_is_rejected() {
        let store = Arc::new(MemoryGateway::new());
        let product = seed_product(&store, dec!(1000), dec!(10)).await;
        let service = SalesService::new(store);

        let result = service
            .checkout(CheckoutRequest {
                lines: vec![CartLine {
                    product_id: product.id,
                    quantity: dec!(3),
                }],
                payment_method: PaymentMethod::Cash,
                amount_paid: Some(dec!(2000)),
                customer_id: None,
                cash_session_id: None,
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
