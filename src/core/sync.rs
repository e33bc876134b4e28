//! Exchange rate synchronization.
//!
//! Fetching ([`QuoteSource`]) is kept apart from derivation ([`resolve_rates`]),
//! which is a pure function of the quote set and the [`RatePolicy`].

use super::config::AppConfig;
use super::error::{StoreError, StoreResult, SyncError, SyncResult};
use super::quote::{QuoteSet, QuoteSource};
use super::rate::{CurrencyInfo, ExchangeRate, RateStore, normalize_code};
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Spread and allow-list applied to every sync.
#[derive(Debug, Clone)]
pub struct RatePolicy {
    spread: f64,
    base_currency: String,
    currencies: Vec<CurrencyInfo>,
}

impl RatePolicy {
    /// `spread` must lie strictly between 0 and 1.
    pub fn new(spread: f64, base_currency: &str, currencies: Vec<CurrencyInfo>) -> SyncResult<Self> {
        if !(spread.is_finite() && spread > 0.0 && spread < 1.0) {
            return Err(SyncError::InvalidPolicy(format!(
                "spread must be in (0, 1), got {spread}"
            )));
        }
        let base_currency =
            normalize_code(base_currency).map_err(|e| SyncError::InvalidPolicy(e.to_string()))?;
        let currencies = currencies
            .into_iter()
            .map(|info| {
                let code = normalize_code(&info.code)
                    .map_err(|e| SyncError::InvalidPolicy(e.to_string()))?;
                Ok(CurrencyInfo { code, ..info })
            })
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(Self {
            spread,
            base_currency,
            currencies,
        })
    }

    pub fn from_config(config: &AppConfig) -> SyncResult<Self> {
        Self::new(
            config.rates.spread,
            &config.base_currency,
            config.rates.currencies.clone(),
        )
    }

    pub fn spread(&self) -> f64 {
        self.spread
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn currencies(&self) -> &[CurrencyInfo] {
        &self.currencies
    }
}

/// Midpoint with the spread applied symmetrically around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedRate {
    pub mid: f64,
    pub buy: f64,
    pub sell: f64,
}

/// Inverts a raw quote (foreign units per base unit) and applies the spread.
///
/// Returns `None` for quotes whose reciprocal is undefined or meaningless.
pub fn derive_rate(raw_quote: f64, spread: f64) -> Option<DerivedRate> {
    if !raw_quote.is_finite() || raw_quote <= 0.0 {
        return None;
    }
    let mid = 1.0 / raw_quote;
    if !mid.is_finite() {
        return None;
    }
    Some(DerivedRate {
        mid,
        buy: mid * (1.0 - spread / 2.0),
        sell: mid * (1.0 + spread / 2.0),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRate {
    pub info: CurrencyInfo,
    pub rate: DerivedRate,
}

/// Derives buy/sell rates for every allow-listed currency present in `quotes`.
/// Absent currencies are skipped silently; unusable quotes with a warning.
pub fn resolve_rates(quotes: &QuoteSet, policy: &RatePolicy) -> Vec<ResolvedRate> {
    policy
        .currencies
        .iter()
        .filter_map(|info| {
            let raw = match quotes.get(&info.code) {
                Some(raw) => raw,
                None => {
                    debug!("No quote for {}", info.code);
                    return None;
                }
            };
            match derive_rate(raw, policy.spread) {
                Some(rate) => Some(ResolvedRate {
                    info: info.clone(),
                    rate,
                }),
                None => {
                    warn!(currency = %info.code, raw, "Skipping unusable quote");
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateUpdate {
    pub currency: String,
    pub action: SyncAction,
}

/// Outcome of [`RateSyncEngine::sync_all`]. Failures are reported, never raised.
#[derive(Debug)]
pub enum SyncReport {
    Synced(Vec<RateUpdate>),
    Failed(SyncError),
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncReport::Synced(_))
    }
}

impl Serialize for SyncReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SyncReport", 2)?;
        match self {
            SyncReport::Synced(updates) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("updates", updates)?;
            }
            SyncReport::Failed(error) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", &error.to_string())?;
            }
        }
        state.end()
    }
}

/// Keeps the rate store in line with an external quote source.
///
/// Concurrent syncs are not serialized; they converge on the same values.
pub struct RateSyncEngine {
    source: Arc<dyn QuoteSource>,
    store: Arc<dyn RateStore>,
    policy: RatePolicy,
}

impl RateSyncEngine {
    pub fn new(source: Arc<dyn QuoteSource>, store: Arc<dyn RateStore>, policy: RatePolicy) -> Self {
        Self {
            source,
            store,
            policy,
        }
    }

    pub fn store(&self) -> &dyn RateStore {
        self.store.as_ref()
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    pub async fn sync_all(&self) -> SyncReport {
        match self.try_sync().await {
            Ok(updates) => {
                info!(count = updates.len(), "Foreign exchange rates synced");
                SyncReport::Synced(updates)
            }
            Err(e) => {
                error!(error = %e, "Failed to sync foreign exchange rates");
                SyncReport::Failed(e)
            }
        }
    }

    async fn try_sync(&self) -> SyncResult<Vec<RateUpdate>> {
        // Nothing is written unless the whole quote set arrived intact.
        let quotes = self.source.fetch_quotes(&self.policy.base_currency).await?;
        let resolved = resolve_rates(&quotes, &self.policy);
        let now = Utc::now();

        let mut updates = Vec::with_capacity(resolved.len());
        for item in resolved {
            let currency = item.info.code.clone();
            match self.upsert(item, now).await {
                Ok(action) => {
                    debug!(%currency, ?action, "Rate reconciled");
                    updates.push(RateUpdate { currency, action });
                }
                Err(e) => warn!(%currency, error = %e, "Failed to persist rate"),
            }
        }
        Ok(updates)
    }

    async fn upsert(&self, item: ResolvedRate, now: DateTime<Utc>) -> StoreResult<SyncAction> {
        if let Some(existing) = self.store.get(&item.info.code).await? {
            self.store.update(refreshed(existing, &item, now)).await?;
            return Ok(SyncAction::Updated);
        }

        let rate = ExchangeRate {
            currency_code: item.info.code.clone(),
            display_name: item.info.name.clone(),
            flag: item.info.flag.clone(),
            buy_rate: item.rate.buy,
            sell_rate: item.rate.sell,
            base_currency_code: self.policy.base_currency.clone(),
            active: true,
            last_synced_at: now,
            created_at: now,
            updated_at: now,
        };
        match self.store.insert(rate).await {
            Ok(()) => Ok(SyncAction::Created),
            // A concurrent sync created it first; last write wins.
            Err(StoreError::Duplicate(_)) => {
                let existing = self
                    .store
                    .get(&item.info.code)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(item.info.code.clone()))?;
                self.store.update(refreshed(existing, &item, now)).await?;
                Ok(SyncAction::Updated)
            }
            Err(e) => Err(e),
        }
    }

    /// Active rates for public display. An empty store triggers one sync first.
    pub async fn list_public(&self) -> StoreResult<Vec<ExchangeRate>> {
        let rates = self.store.list(true).await?;
        if !rates.is_empty() {
            return Ok(rates);
        }

        info!("No foreign exchange rates found. Syncing from external source...");
        match self.sync_all().await {
            SyncReport::Synced(_) => {
                let rates = self.store.list(true).await?;
                info!("Successfully synced {} exchange rates", rates.len());
                Ok(rates)
            }
            SyncReport::Failed(_) => Ok(rates),
        }
    }

    /// Every stored rate, including inactive ones.
    pub async fn list_all(&self) -> StoreResult<Vec<ExchangeRate>> {
        self.store.list(false).await
    }
}

fn refreshed(mut existing: ExchangeRate, item: &ResolvedRate, now: DateTime<Utc>) -> ExchangeRate {
    existing.buy_rate = item.rate.buy;
    existing.sell_rate = item.rate.sell;
    existing.last_synced_at = now;
    existing.updated_at = now;
    existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate::default_currencies;
    use crate::store::memory::MemoryRateStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticQuotes {
        rates: Option<HashMap<String, f64>>,
        call_count: AtomicUsize,
    }

    impl StaticQuotes {
        fn new(pairs: &[(&str, f64)]) -> Self {
            Self {
                rates: Some(pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect()),
                call_count: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                rates: None,
                call_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for StaticQuotes {
        async fn fetch_quotes(&self, base_currency: &str) -> SyncResult<QuoteSet> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match &self.rates {
                Some(rates) => Ok(QuoteSet {
                    base: Some(base_currency.to_string()),
                    rates: rates.clone(),
                }),
                None => Err(SyncError::ExternalSource(
                    "API returned status 503 Service Unavailable".to_string(),
                )),
            }
        }
    }

    /// Delegates to a memory store but refuses to write one currency.
    struct RejectingStore {
        inner: MemoryRateStore,
        reject: &'static str,
    }

    #[async_trait]
    impl RateStore for RejectingStore {
        async fn get(&self, code: &str) -> StoreResult<Option<ExchangeRate>> {
            self.inner.get(code).await
        }

        async fn list(&self, active_only: bool) -> StoreResult<Vec<ExchangeRate>> {
            self.inner.list(active_only).await
        }

        async fn insert(&self, rate: ExchangeRate) -> StoreResult<()> {
            if rate.currency_code == self.reject {
                return Err(StoreError::Invalid("validation failed".to_string()));
            }
            self.inner.insert(rate).await
        }

        async fn update(&self, rate: ExchangeRate) -> StoreResult<()> {
            self.inner.update(rate).await
        }

        async fn remove(&self, code: &str) -> StoreResult<bool> {
            self.inner.remove(code).await
        }
    }

    fn policy() -> RatePolicy {
        RatePolicy::new(0.02, "TZS", default_currencies()).unwrap()
    }

    fn engine(source: StaticQuotes, store: Arc<dyn RateStore>) -> RateSyncEngine {
        RateSyncEngine::new(Arc::new(source), store, policy())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_derive_rate_example() {
        let rate = derive_rate(0.0004, 0.02).unwrap();
        assert_close(rate.mid, 2500.0);
        assert_close(rate.buy, 2475.0);
        assert_close(rate.sell, 2525.0);
    }

    #[test]
    fn test_derive_rate_spread_property() {
        for raw in [0.0004, 0.00037, 0.055, 1.0, 3.5, 250.0] {
            for spread in [0.001, 0.02, 0.1, 0.5, 0.99] {
                let rate = derive_rate(raw, spread).unwrap();
                assert!(rate.sell > rate.buy);
                assert!(rate.buy > 0.0);
                let gap = rate.sell - rate.buy;
                assert!((gap - rate.mid * spread).abs() <= 1e-9 * rate.mid.max(1.0));
            }
        }
    }

    #[test]
    fn test_derive_rate_rejects_unusable_quotes() {
        assert!(derive_rate(0.0, 0.02).is_none());
        assert!(derive_rate(-1.0, 0.02).is_none());
        assert!(derive_rate(f64::NAN, 0.02).is_none());
        assert!(derive_rate(f64::INFINITY, 0.02).is_none());
    }

    #[test]
    fn test_policy_validation() {
        assert!(RatePolicy::new(0.0, "TZS", vec![]).is_err());
        assert!(RatePolicy::new(1.0, "TZS", vec![]).is_err());
        assert!(RatePolicy::new(f64::NAN, "TZS", vec![]).is_err());
        assert!(RatePolicy::new(0.02, "TZSX", vec![]).is_err());

        let policy = RatePolicy::new(
            0.02,
            "tzs",
            vec![CurrencyInfo::new("usd", "US Dollar", "US")],
        )
        .unwrap();
        assert_eq!(policy.base_currency(), "TZS");
        assert_eq!(policy.currencies()[0].code, "USD");
    }

    #[test]
    fn test_resolve_rates_filters_to_allow_list() {
        let quotes = QuoteSet {
            base: Some("TZS".to_string()),
            rates: HashMap::from([
                ("USD".to_string(), 0.0004),
                ("XAU".to_string(), 0.0000002),
                ("EUR".to_string(), 0.0),
            ]),
        };

        let resolved = resolve_rates(&quotes, &policy());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].info.code, "USD");
        assert_eq!(resolved[0].info.name, "US Dollar");
    }

    #[tokio::test]
    async fn test_sync_creates_then_updates() {
        let store = Arc::new(MemoryRateStore::new());
        let engine = engine(StaticQuotes::new(&[("USD", 0.0004)]), store.clone());

        let first = engine.sync_all().await;
        match &first {
            SyncReport::Synced(updates) => assert_eq!(
                updates,
                &vec![RateUpdate {
                    currency: "USD".to_string(),
                    action: SyncAction::Created
                }]
            ),
            SyncReport::Failed(e) => panic!("sync failed: {e}"),
        }
        let created = store.get("USD").await.unwrap().unwrap();
        assert_close(created.buy_rate, 2475.0);
        assert_close(created.sell_rate, 2525.0);
        assert_eq!(created.base_currency_code, "TZS");
        assert_eq!(created.display_name, "US Dollar");
        assert!(created.active);

        let second = engine.sync_all().await;
        match &second {
            SyncReport::Synced(updates) => {
                assert_eq!(updates.len(), 1);
                assert_eq!(updates[0].action, SyncAction::Updated);
            }
            SyncReport::Failed(e) => panic!("sync failed: {e}"),
        }
        let updated = store.get("USD").await.unwrap().unwrap();
        assert_eq!(updated.buy_rate, created.buy_rate);
        assert_eq!(updated.sell_rate, created.sell_rate);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.last_synced_at >= created.last_synced_at);
    }

    #[tokio::test]
    async fn test_sync_keeps_admin_fields() {
        let store = Arc::new(MemoryRateStore::new());
        let engine = engine(StaticQuotes::new(&[("EUR", 0.00037)]), store.clone());
        engine.sync_all().await;

        let mut rate = store.get("EUR").await.unwrap().unwrap();
        rate.active = false;
        rate.display_name = "Euro (EU)".to_string();
        store.update(rate).await.unwrap();

        engine.sync_all().await;
        let rate = store.get("EUR").await.unwrap().unwrap();
        assert!(!rate.active);
        assert_eq!(rate.display_name, "Euro (EU)");
    }

    #[tokio::test]
    async fn test_sync_skips_missing_currencies() {
        let store = Arc::new(MemoryRateStore::new());
        let engine = engine(
            StaticQuotes::new(&[("USD", 0.0004), ("GBP", 0.0003)]),
            store.clone(),
        );

        let report = engine.sync_all().await;
        assert!(report.is_success());
        if let SyncReport::Synced(updates) = report {
            let currencies: Vec<_> = updates.iter().map(|u| u.currency.as_str()).collect();
            assert_eq!(currencies, vec!["USD", "GBP"]);
        }
        assert_eq!(store.list(false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_failure_leaves_store_unchanged() {
        let store = Arc::new(MemoryRateStore::new());
        let engine = engine(StaticQuotes::failing(), store.clone());

        let report = engine.sync_all().await;
        assert!(matches!(
            report,
            SyncReport::Failed(SyncError::ExternalSource(_))
        ));
        assert!(store.list(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_existing_rates() {
        let store = Arc::new(MemoryRateStore::new());
        let seeded = engine(StaticQuotes::new(&[("USD", 0.0004)]), store.clone());
        assert!(seeded.sync_all().await.is_success());
        let before = store.list(false).await.unwrap();

        let failing = engine(StaticQuotes::failing(), store.clone());
        assert!(!failing.sync_all().await.is_success());

        let after = store.list(false).await.unwrap();
        assert_eq!(before, after);
        let usd = store.get("USD").await.unwrap().unwrap();
        assert_close(usd.buy_rate, 2475.0);
        assert_close(usd.sell_rate, 2525.0);
    }

    #[tokio::test]
    async fn test_sync_excludes_currency_that_fails_to_persist() {
        let store = Arc::new(RejectingStore {
            inner: MemoryRateStore::new(),
            reject: "EUR",
        });
        let engine = engine(
            StaticQuotes::new(&[("USD", 0.0004), ("EUR", 0.00037), ("KES", 0.05)]),
            store.clone(),
        );

        let report = engine.sync_all().await;
        let SyncReport::Synced(updates) = report else {
            panic!("expected a successful sync");
        };
        let currencies: Vec<_> = updates.iter().map(|u| u.currency.as_str()).collect();
        assert_eq!(currencies, vec!["USD", "KES"]);
        assert!(store.get("EUR").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_public_bootstraps_once() {
        let store = Arc::new(MemoryRateStore::new());
        let source = Arc::new(StaticQuotes::new(&[("USD", 0.0004)]));
        let engine = RateSyncEngine::new(source.clone(), store, policy());

        let rates = engine.list_public().await.unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(source.call_count.load(Ordering::SeqCst), 1);

        engine.list_public().await.unwrap();
        assert_eq!(source.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_list_public_survives_failed_bootstrap() {
        let store = Arc::new(MemoryRateStore::new());
        let engine = engine(StaticQuotes::failing(), store);

        let rates = engine.list_public().await.unwrap();
        assert!(rates.is_empty());
    }

    #[test]
    fn test_report_serialization() {
        let synced = SyncReport::Synced(vec![RateUpdate {
            currency: "USD".to_string(),
            action: SyncAction::Created,
        }]);
        assert_eq!(
            serde_json::to_value(&synced).unwrap(),
            serde_json::json!({
                "success": true,
                "updates": [{ "currency": "USD", "action": "created" }]
            })
        );

        let failed = SyncReport::Failed(SyncError::ExternalSource("boom".to_string()));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({
                "success": false,
                "error": "External source error: boom"
            })
        );
    }
}
