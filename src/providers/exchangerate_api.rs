use crate::core::error::{SyncError, SyncResult};
use crate::core::quote::{QuoteSet, QuoteSource};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Quote source backed by the exchangerate-api.com `v4/latest` endpoint.
pub struct ExchangeRateApiProvider {
    base_url: String,
    timeout: Duration,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        ExchangeRateApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl QuoteSource for ExchangeRateApiProvider {
    #[instrument(name = "ExchangeRateApiFetch", skip(self), fields(base = %base_currency))]
    async fn fetch_quotes(&self, base_currency: &str) -> SyncResult<QuoteSet> {
        let url = format!("{}/v4/latest/{}", self.base_url, base_currency);
        debug!("Requesting quotes from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("bankcms/1.0")
            .timeout(self.timeout)
            .build()
            .map_err(|e| SyncError::ExternalSource(format!("Client error: {e}")))?;

        let response = client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::ExternalSource(format!(
                    "Request timed out after {}s for {url}",
                    self.timeout.as_secs()
                ))
            } else {
                SyncError::ExternalSource(format!("Request error: {e} for {url}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(SyncError::ExternalSource(format!(
                "API returned status {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| SyncError::ExternalSource(format!("Failed to read response: {e}")))?;

        let quotes: QuoteSet = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(e) => {
                error!(error = ?e, response = %text, "Failed to parse quote response");
                return Err(SyncError::ExternalSource(format!(
                    "Failed to parse response: {e}"
                )));
            }
        };

        debug!(count = quotes.rates.len(), "Received quotes");
        Ok(quotes)
    }
}
