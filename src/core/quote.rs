//! Raw quote abstractions

use super::error::SyncResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Quotes as published upstream: units of each currency per one unit of `base`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteSet {
    #[serde(default)]
    pub base: Option<String>,
    pub rates: HashMap<String, f64>,
}

impl QuoteSet {
    pub fn get(&self, currency_code: &str) -> Option<f64> {
        self.rates.get(currency_code).copied()
    }
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quotes(&self, base_currency: &str) -> SyncResult<QuoteSet>;
}
