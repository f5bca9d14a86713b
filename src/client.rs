//! Price API client
//!
//! Thin client for the single-price lookup endpoint
//! (`?fsym={coin}&tsyms={currency}&e={exchange}`). A usable response is a
//! JSON object carrying a numeric field named after the requested quote
//! currency.

use anyhow::{anyhow, Context, Result};
use log::info;
use reqwest::Client;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PriceClient {
    client: Client,
    base_url: String,
}

impl PriceClient {
    /// Create a new price client against `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("coinwatch/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetch the current price of `coin` on `exchange`, quoted in `currency`
    pub async fn fetch_price(&self, coin: &str, currency: &str, exchange: &str) -> Result<f64> {
        let url = format!(
            "{}?fsym={}&tsyms={}&e={}",
            self.base_url, coin, currency, exchange
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request failed for {} on {}", coin, exchange))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Price API error: {} - {}", status, body));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse price response for {} on {}", coin, exchange))?;

        // Success is signaled by a field named after the requested quote
        // currency; anything else is unusable.
        match data.get(currency).and_then(|v| v.as_f64()) {
            Some(price) => Ok(price),
            None => {
                info!("Unusable price response for {} on {}: {}", coin, exchange, data);
                Err(anyhow!(
                    "Response missing {} price for {} on {}",
                    currency,
                    coin,
                    exchange
                ))
            }
        }
    }
}
