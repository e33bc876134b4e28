use crate::core::error::{StoreError, StoreResult};
use crate::core::rate::{ExchangeRate, RateStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory rate store; ordered by currency code.
#[derive(Clone, Default)]
pub struct MemoryRateStore {
    inner: Arc<Mutex<BTreeMap<String, ExchangeRate>>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn get(&self, currency_code: &str) -> StoreResult<Option<ExchangeRate>> {
        let rates = self.inner.lock().await;
        let rate = rates.get(currency_code).cloned();
        if rate.is_some() {
            debug!("Rate HIT for {}", currency_code);
        } else {
            debug!("Rate MISS for {}", currency_code);
        }
        Ok(rate)
    }

    async fn list(&self, active_only: bool) -> StoreResult<Vec<ExchangeRate>> {
        let rates = self.inner.lock().await;
        Ok(rates
            .values()
            .filter(|r| !active_only || r.active)
            .cloned()
            .collect())
    }

    async fn insert(&self, rate: ExchangeRate) -> StoreResult<()> {
        let mut rates = self.inner.lock().await;
        if rates.contains_key(&rate.currency_code) {
            return Err(StoreError::Duplicate(rate.currency_code));
        }
        debug!("Rate INSERT for {}", rate.currency_code);
        rates.insert(rate.currency_code.clone(), rate);
        Ok(())
    }

    async fn update(&self, rate: ExchangeRate) -> StoreResult<()> {
        let mut rates = self.inner.lock().await;
        match rates.get_mut(&rate.currency_code) {
            Some(existing) => {
                debug!("Rate UPDATE for {}", rate.currency_code);
                *existing = rate;
                Ok(())
            }
            None => Err(StoreError::NotFound(rate.currency_code)),
        }
    }

    async fn remove(&self, currency_code: &str) -> StoreResult<bool> {
        let mut rates = self.inner.lock().await;
        debug!("Rate REMOVE for {}", currency_code);
        Ok(rates.remove(currency_code).is_some())
    }
}
