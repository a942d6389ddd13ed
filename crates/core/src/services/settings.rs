use chrono::Utc;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::{
    BusinessProfile, ConfigItem, CONFIG_BUSINESS_PROFILE, CONFIG_EXCHANGE_RATE,
    CONFIG_INVENTORY_CONTROL,
};
use crate::errors::{Error, Result};
use crate::gateway::{Filter, Select, StoreGateway};

/// Typed access over the `config` table.
pub struct SettingsService {
    store: Arc<dyn StoreGateway>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &str) -> Result<Option<ConfigItem>> {
        let rows = self
            .store
            .select(
                Select::from(ConfigItem::TABLE)
                    .filter(Filter::eq("key", key))
                    .limit(1),
            )
            .await?;
        rows.first().map(ConfigItem::from_row).transpose()
    }

    pub async fn set(&self, key: &str, value: impl Into<String>) -> Result<ConfigItem> {
        let item = ConfigItem {
            key: key.to_string(),
            value: value.into(),
            updated_at: Utc::now().to_rfc3339(),
        };
        if self.get(key).await?.is_some() {
            self.store
                .update(ConfigItem::TABLE, key, item.to_row())
                .await?;
        } else {
            self.store.insert(ConfigItem::TABLE, item.to_row()).await?;
        }
        Ok(item)
    }

    pub async fn exchange_rate(&self) -> Result<Option<Decimal>> {
        match self.get(CONFIG_EXCHANGE_RATE).await? {
            Some(item) => Decimal::from_str(&item.value)
                .map(Some)
                .map_err(|e| Error::mapping(format!("exchange_rate: {}", e))),
            None => Ok(None),
        }
    }

    pub async fn set_exchange_rate(&self, rate: Decimal) -> Result<()> {
        if rate <= Decimal::ZERO {
            return Err(Error::validation("exchange rate must be positive"));
        }
        self.set(CONFIG_EXCHANGE_RATE, rate.to_string()).await?;
        Ok(())
    }

    /// Stock decrements on sale default to enabled when the toggle was never
    /// configured.
    pub async fn inventory_control_enabled(&self) -> Result<bool> {
        Ok(self
            .get(CONFIG_INVENTORY_CONTROL)
            .await?
            .map(|item| item.value != "0")
            .unwrap_or(true))
    }

    pub async fn set_inventory_control(&self, enabled: bool) -> Result<()> {
        self.set(CONFIG_INVENTORY_CONTROL, if enabled { "1" } else { "0" })
            .await?;
        Ok(())
    }

    pub async fn business_profile(&self) -> Result<Option<BusinessProfile>> {
        match self.get(CONFIG_BUSINESS_PROFILE).await? {
            Some(item) => Ok(Some(serde_json::from_str(&item.value)?)),
            None => Ok(None),
        }
    }

    pub async fn set_business_profile(&self, profile: &BusinessProfile) -> Result<()> {
        self.set(CONFIG_BUSINESS_PROFILE, serde_json::to_string(profile)?)
            .await?;
        Ok(())
    }
}
