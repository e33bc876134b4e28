//! Exchange rate records and the store they live in

use super::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_CURRENCY: &str = "TZS";

/// One displayed currency, keyed by its code.
///
/// Rates are quoted as units of `base_currency_code` per one unit of
/// `currency_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub currency_code: String,
    pub display_name: String,
    pub flag: Option<String>,
    pub buy_rate: f64,
    pub sell_rate: f64,
    pub base_currency_code: String,
    pub active: bool,
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display metadata for a currency on the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub flag: Option<String>,
}

impl CurrencyInfo {
    pub fn new(code: &str, name: &str, flag: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            flag: Some(flag.to_string()),
        }
    }
}

/// The curated set of currencies shown on the website.
pub fn default_currencies() -> Vec<CurrencyInfo> {
    vec![
        CurrencyInfo::new("USD", "US Dollar", "🇺🇸"),
        CurrencyInfo::new("EUR", "Euro", "🇪🇺"),
        CurrencyInfo::new("GBP", "British Pound", "🇬🇧"),
        CurrencyInfo::new("KES", "Kenyan Shilling", "🇰🇪"),
        CurrencyInfo::new("INR", "Indian Rupee", "🇮🇳"),
        CurrencyInfo::new("AUD", "Australian Dollar", "🇦🇺"),
        CurrencyInfo::new("CAD", "Canadian Dollar", "🇨🇦"),
        CurrencyInfo::new("CHF", "Swiss Franc", "🇨🇭"),
        CurrencyInfo::new("JPY", "Japanese Yen", "🇯🇵"),
        CurrencyInfo::new("CNY", "Chinese Yuan", "🇨🇳"),
        CurrencyInfo::new("ZAR", "South African Rand", "🇿🇦"),
        CurrencyInfo::new("SAR", "Saudi Riyal", "🇸🇦"),
    ]
}

/// Persistence for exchange rates, keyed by currency code.
#[async_trait]
pub trait RateStore: Send + Sync {
    async fn get(&self, currency_code: &str) -> StoreResult<Option<ExchangeRate>>;

    /// Returns records sorted by currency code.
    async fn list(&self, active_only: bool) -> StoreResult<Vec<ExchangeRate>>;

    /// Fails with [`StoreError::Duplicate`] when the code is taken.
    async fn insert(&self, rate: ExchangeRate) -> StoreResult<()>;

    /// Fails with [`StoreError::NotFound`] when the code is unknown.
    async fn update(&self, rate: ExchangeRate) -> StoreResult<()>;

    /// Returns whether a record was removed.
    async fn remove(&self, currency_code: &str) -> StoreResult<bool>;
}

/// Admin input for a manually entered rate.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRate {
    pub currency_code: String,
    pub display_name: String,
    pub flag: Option<String>,
    pub buy_rate: f64,
    pub sell_rate: f64,
    pub base_currency_code: Option<String>,
    pub active: Option<bool>,
}

/// Partial admin update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RatePatch {
    pub display_name: Option<String>,
    pub flag: Option<String>,
    pub buy_rate: Option<f64>,
    pub sell_rate: Option<f64>,
    pub base_currency_code: Option<String>,
    pub active: Option<bool>,
}

/// Normalizes and validates a currency code: three ASCII letters, uppercased.
pub fn normalize_code(code: &str) -> StoreResult<String> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(StoreError::Invalid(format!(
            "currency code must be three letters, got '{code}'"
        )));
    }
    Ok(code)
}

fn validate_rates(buy_rate: f64, sell_rate: f64) -> StoreResult<()> {
    if !(buy_rate.is_finite() && buy_rate > 0.0 && sell_rate.is_finite() && sell_rate > 0.0) {
        return Err(StoreError::Invalid(format!(
            "rates must be positive, got buy {buy_rate} sell {sell_rate}"
        )));
    }
    Ok(())
}

pub async fn create_rate(
    store: &dyn RateStore,
    input: NewRate,
    default_base: &str,
) -> StoreResult<ExchangeRate> {
    let currency_code = normalize_code(&input.currency_code)?;
    validate_rates(input.buy_rate, input.sell_rate)?;
    let base_currency_code = match input.base_currency_code.as_deref() {
        Some(base) => normalize_code(base)?,
        None => default_base.to_ascii_uppercase(),
    };

    let now = Utc::now();
    let rate = ExchangeRate {
        currency_code,
        display_name: input.display_name,
        flag: input.flag,
        buy_rate: input.buy_rate,
        sell_rate: input.sell_rate,
        base_currency_code,
        active: input.active.unwrap_or(true),
        last_synced_at: now,
        created_at: now,
        updated_at: now,
    };
    store.insert(rate.clone()).await?;
    Ok(rate)
}

pub async fn update_rate(
    store: &dyn RateStore,
    currency_code: &str,
    patch: RatePatch,
) -> StoreResult<ExchangeRate> {
    let code = normalize_code(currency_code)?;
    let mut rate = store
        .get(&code)
        .await?
        .ok_or_else(|| StoreError::NotFound(code.clone()))?;

    if let Some(name) = patch.display_name {
        rate.display_name = name;
    }
    if let Some(flag) = patch.flag {
        rate.flag = Some(flag);
    }
    if let Some(buy) = patch.buy_rate {
        rate.buy_rate = buy;
    }
    if let Some(sell) = patch.sell_rate {
        rate.sell_rate = sell;
    }
    if let Some(base) = patch.base_currency_code.as_deref() {
        rate.base_currency_code = normalize_code(base)?;
    }
    if let Some(active) = patch.active {
        rate.active = active;
    }
    validate_rates(rate.buy_rate, rate.sell_rate)?;

    let now = Utc::now();
    rate.last_synced_at = now;
    rate.updated_at = now;
    store.update(rate.clone()).await?;
    Ok(rate)
}

pub async fn delete_rate(store: &dyn RateStore, currency_code: &str) -> StoreResult<()> {
    let code = normalize_code(currency_code)?;
    if store.remove(&code).await? {
        Ok(())
    } else {
        Err(StoreError::NotFound(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRateStore;

    fn usd() -> NewRate {
        NewRate {
            currency_code: "usd".to_string(),
            display_name: "US Dollar".to_string(),
            flag: None,
            buy_rate: 2475.0,
            sell_rate: 2525.0,
            base_currency_code: None,
            active: None,
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" usd ").unwrap(), "USD");
        assert!(normalize_code("US").is_err());
        assert!(normalize_code("U5D").is_err());
    }

    #[test]
    fn test_default_currencies_are_unique() {
        let currencies = default_currencies();
        let mut codes: Vec<_> = currencies.iter().map(|c| c.code.as_str()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 12);
    }

    #[tokio::test]
    async fn test_create_rate_normalizes_and_defaults() {
        let store = MemoryRateStore::new();
        let rate = create_rate(&store, usd(), "tzs").await.unwrap();

        assert_eq!(rate.currency_code, "USD");
        assert_eq!(rate.base_currency_code, "TZS");
        assert!(rate.active);
        assert_eq!(store.get("USD").await.unwrap(), Some(rate));
    }

    #[tokio::test]
    async fn test_create_rate_rejects_duplicate() {
        let store = MemoryRateStore::new();
        create_rate(&store, usd(), "TZS").await.unwrap();

        let result = create_rate(&store, usd(), "TZS").await;
        assert!(matches!(result, Err(StoreError::Duplicate(code)) if code == "USD"));
    }

    #[tokio::test]
    async fn test_create_rate_rejects_non_positive_rates() {
        let store = MemoryRateStore::new();
        let mut input = usd();
        input.buy_rate = 0.0;

        let result = create_rate(&store, input, "TZS").await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert!(store.list(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rate_applies_patch() {
        let store = MemoryRateStore::new();
        create_rate(&store, usd(), "TZS").await.unwrap();

        let patch = RatePatch {
            sell_rate: Some(2600.0),
            active: Some(false),
            ..Default::default()
        };
        let updated = update_rate(&store, "usd", patch).await.unwrap();

        assert_eq!(updated.buy_rate, 2475.0);
        assert_eq!(updated.sell_rate, 2600.0);
        assert!(!updated.active);
        assert!(store.list(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rate_changes_base_currency() {
        let store = MemoryRateStore::new();
        create_rate(&store, usd(), "TZS").await.unwrap();

        let patch = RatePatch {
            base_currency_code: Some("kes".to_string()),
            ..Default::default()
        };
        let updated = update_rate(&store, "USD", patch).await.unwrap();
        assert_eq!(updated.base_currency_code, "KES");
        assert_eq!(
            store.get("USD").await.unwrap().unwrap().base_currency_code,
            "KES"
        );

        let patch = RatePatch {
            base_currency_code: Some("shilling".to_string()),
            ..Default::default()
        };
        let result = update_rate(&store, "USD", patch).await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_rate() {
        let store = MemoryRateStore::new();

        let result = update_rate(&store, "EUR", RatePatch::default()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        let result = delete_rate(&store, "EUR").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_rate() {
        let store = MemoryRateStore::new();
        create_rate(&store, usd(), "TZS").await.unwrap();

        delete_rate(&store, "USD").await.unwrap();
        assert!(store.get("USD").await.unwrap().is_none());
    }
}
