//! Price collection run
//!
//! One run walks the tracked coins in order. For each coin it fans out one
//! fetch per tracked exchange with bounded concurrency, commits that coin's
//! successful samples as a single batch, then pauses before the next coin to
//! stay under the upstream per-second rate limit.

use crate::client::PriceClient;
use crate::config::Config;
use crate::store::{PriceSample, Store};
use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::future::join_all;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct Collector {
    client: PriceClient,
    store: Store,
    config: Arc<Config>,
}

impl Collector {
    pub fn new(client: PriceClient, store: Store, config: Arc<Config>) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Execute one collection run across all tracked coins.
    ///
    /// Individual fetch failures are logged and dropped; a commit failure
    /// ends the run early, leaving earlier coin batches in place.
    pub async fn run(&self) -> Result<()> {
        for (i, coin) in self.config.coins.iter().enumerate() {
            if i > 0 {
                // upstream rate limit: at most one burst per second
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let samples = self.collect_coin(coin).await;
            self.store
                .append_batch(&samples)
                .await
                .with_context(|| format!("Failed to commit price batch for {}", coin))?;
        }
        Ok(())
    }

    /// Fetch `coin` from every tracked exchange concurrently, bounded by a
    /// pool of exchange count + 1 workers. Failed fetches yield no sample.
    async fn collect_coin(&self, coin: &str) -> Vec<PriceSample> {
        let semaphore = Arc::new(Semaphore::new(self.config.exchanges.len() + 1));
        let mut handles = Vec::with_capacity(self.config.exchanges.len());

        for exchange in &self.config.exchanges {
            let semaphore = semaphore.clone();
            let client = self.client.clone();
            let coin = coin.to_string();
            let exchange = exchange.clone();
            let currency = self.config.quote_currency.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.ok()?;
                let updated_at = Utc::now();
                match client.fetch_price(&coin, &currency, &exchange).await {
                    Ok(price) => Some(PriceSample {
                        coin,
                        exchange,
                        price,
                        updated_at,
                    }),
                    Err(e) => {
                        warn!("Dropping {} sample from {}: {:#}", coin, exchange, e);
                        None
                    }
                }
            }));
        }

        let mut samples = Vec::new();
        for handle in join_all(handles).await {
            match handle {
                Ok(Some(sample)) => samples.push(sample),
                Ok(None) => {}
                Err(e) => warn!("Fetch task for {} died: {}", coin, e),
            }
        }

        info!(
            "Collected {}/{} exchange prices for {}",
            samples.len(),
            self.config.exchanges.len(),
            coin
        );
        samples
    }
}
