use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{CashSession, PaymentMethod, Sale};
use crate::errors::{Error, Result};
use crate::gateway::{Filter, Select, StoreGateway};

/// Register open/close ("apertura y cierre de caja").
pub struct CashSessionsService {
    store: Arc<dyn StoreGateway>,
}

impl CashSessionsService {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self { store }
    }

    pub async fn current_open(&self) -> Result<Option<CashSession>> {
        let rows = self
            .store
            .select(
                Select::from(CashSession::TABLE)
                    .filter(Filter::is_null("closed_at"))
                    .limit(1),
            )
            .await?;
        rows.first().map(CashSession::from_row).transpose()
    }

    pub async fn open(&self, opening_amount: Decimal) -> Result<CashSession> {
        if opening_amount < Decimal::ZERO {
            return Err(Error::validation("opening amount cannot be negative"));
        }
        if self.current_open().await?.is_some() {
            return Err(Error::validation("a cash session is already open"));
        }
        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            opened_at: Utc::now().to_rfc3339(),
            closed_at: None,
            opening_amount,
            counted_amount: None,
            expected_amount: None,
            difference: None,
        };
        self.store
            .insert(CashSession::TABLE, session.to_row())
            .await?;
        Ok(session)
    }

    /// Close the session: expected cash is the opening float plus every cash
    /// sale recorded against it, minus change handed back.
    pub async fn close(&self, id: &str, counted_amount: Decimal) -> Result<CashSession> {
        let rows = self
            .store
            .select(
                Select::from(CashSession::TABLE)
                    .filter(Filter::eq("id", id))
                    .limit(1),
            )
            .await?;
        let row = rows.first().ok_or_else(|| Error::NotFound {
            entity: "cash session",
            id: id.to_string(),
        })?;
        let mut session = CashSession::from_row(row)?;
        if !session.is_open() {
            return Err(Error::validation("cash session is already closed"));
        }

        let sale_rows = self
            .store
            .select(Select::from(Sale::TABLE).filter(Filter::eq("cash_session_id", id)))
            .await?;
        let mut cash_total = Decimal::ZERO;
        for sale_row in &sale_rows {
            let sale = Sale::from_row(sale_row)?;
            if sale.payment_method == PaymentMethod::Cash {
                cash_total += sale.total;
            }
        }

        let expected = session.opening_amount + cash_total;
        session.closed_at = Some(Utc::now().to_rfc3339());
        session.counted_amount = Some(counted_amount);
        session.expected_amount = Some(expected);
        session.difference = Some(counted_amount - expected);
        self.store
            .update(CashSession::TABLE, id, session.to_row())
            .await?;
        Ok(session)
    }
}
