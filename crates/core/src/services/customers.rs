use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::Customer;
use crate::errors::{Error, Result};
use crate::gateway::{Filter, Select, StoreGateway};

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub struct CustomersService {
    store: Arc<dyn StoreGateway>,
}

impl CustomersService {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_customer: NewCustomer) -> Result<Customer> {
        if new_customer.name.trim().is_empty() {
            return Err(Error::validation("customer name is required"));
        }
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: new_customer.name,
            phone: new_customer.phone,
            email: new_customer.email,
            credit_balance: Decimal::ZERO,
            updated_at: Utc::now().to_rfc3339(),
        };
        self.store
            .insert(Customer::TABLE, customer.to_row())
            .await?;
        Ok(customer)
    }

    pub async fn update(&self, mut customer: Customer) -> Result<Customer> {
        customer.updated_at = Utc::now().to_rfc3339();
        self.store
            .update(Customer::TABLE, &customer.id.clone(), customer.to_row())
            .await?;
        Ok(customer)
    }

    pub async fn get(&self, id: &str) -> Result<Customer> {
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

    pub async fn list(&self) -> Result<Vec<Customer>> {
        let rows = self
            .store
            .select(Select::from(Customer::TABLE).order_by("name", false))
            .await?;
        rows.iter().map(Customer::from_row).collect()
    }

    /// Cascade guard: a customer with recorded sales cannot be removed.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let sales = self
            .store
            .select(
                Select::from("sales")
                    .filter(Filter::eq("customer_id", id))
                    .limit(1),
            )
            .await?;
        if !sales.is_empty() {
            return Err(Error::validation("customer has sales"));
        }
        self.store.delete(Customer::TABLE, id).await
    }

    /// Record a payment against the customer's outstanding credit.
    pub async fn settle_credit(&self, id: &str, amount: Decimal) -> Result<Customer> {
        if amount <= Decimal::ZERO {
            return Err(Error::validation("payment must be positive"));
        }
        let mut customer = self.get(id).await?;
        if amount > customer.credit_balance {
            return Err(Error::validation(format!(
                "payment {} exceeds balance {}",
                amount, customer.credit_balance
            )));
        }
        customer.credit_balance -= amount;
        self.update(customer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::MemoryGateway;
    use rust_decimal_macros::dec;

    fn service() -> (Arc<MemoryGateway>, CustomersService) {
        let store = Arc::new(MemoryGateway::new());
        (store.clone(), CustomersService::new(store))
    }

    #[tokio::test]
    async fn delete_is_guarded_when_customer_has_sales() {
        let (store, service) = service();
        let customer = service
            .create(NewCustomer {
                name: "Ana".into(),
                phone: None,
                email: None,
            })
            .await
            .unwrap();

        let mut sale = crate::gateway::Row::new();
        sale.insert("id".into(), "s1".into());
        sale.insert("customer_id".into(), customer.id.clone().into());
        store.insert("sales", sale).await.unwrap();

        assert!(matches!(
            service.delete(&customer.id).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(store.len(Customer::TABLE), 1);
    }

    #[tokio::test]
    async fn settle_credit_rejects_overpayment() {
        let (_store, service) = service();
        let mut customer = service
            .create(NewCustomer {
                name: "Luis".into(),
                phone: Some("8888-1234".into()),
                email: None,
            })
            .await
            .unwrap();
        customer.credit_balance = dec!(5000);
        service.update(customer.clone()).await.unwrap();

        assert!(service.settle_credit(&customer.id, dec!(6000)).await.is_err());
        let settled = service.settle_credit(&customer.id, dec!(2000)).await.unwrap();
        assert_eq!(settled.credit_balance, dec!(3000));
    }
}
