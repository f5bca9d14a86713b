//! Price observation storage
//!
//! Append-only `coin_status` table over a SQLite pool. Rows are never
//! updated or deleted; the latest value for a (coin, exchange) pair is the
//! row with the greatest id, not the greatest timestamp.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// One recorded (coin, exchange, price, timestamp) observation.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PriceObservation {
    pub id: i64,
    pub coin: String,
    pub exchange: String,
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

/// A price sample produced by a fetch, not yet persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSample {
    pub coin: String,
    pub exchange: String,
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Wrap an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the single-file database behind `database_url`, creating the
    /// file if missing.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)
            .context("Failed to parse database URL")?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_opts)
            .await
            .context("Failed to create database pool")?;

        Ok(Self::new(pool))
    }

    /// Create the coin_status table if it does not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coin_status (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                coin TEXT NOT NULL,
                exchange TEXT NOT NULL,
                price REAL NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create coin_status table")?;

        Ok(())
    }

    /// Append one coin's batch of samples as a single transaction.
    ///
    /// An empty batch is a no-op.
    pub async fn append_batch(&self, samples: &[PriceSample]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin price batch transaction")?;

        for sample in samples {
            sqlx::query(
                r#"
                INSERT INTO coin_status (coin, exchange, price, updated_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&sample.coin)
            .bind(&sample.exchange)
            .bind(sample.price)
            .bind(sample.updated_at)
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!("Failed to insert observation for {} on {}", sample.coin, sample.exchange)
            })?;
        }

        tx.commit().await.context("Failed to commit price batch")?;

        debug!("Committed {} price observations", samples.len());
        Ok(())
    }

    /// Latest observation for a pair, by insertion order
    pub async fn latest(&self, coin: &str, exchange: &str) -> Result<Option<PriceObservation>> {
        let record = sqlx::query_as::<_, PriceObservation>(
            r#"
            SELECT id, coin, exchange, price, updated_at
            FROM coin_status
            WHERE coin = ? AND exchange = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(coin)
        .bind(exchange)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest observation")?;

        Ok(record)
    }

    /// Latest observation for every tracked pair that has one; pairs with no
    /// observations are not included.
    pub async fn latest_all(
        &self,
        coins: &[String],
        exchanges: &[String],
    ) -> Result<Vec<PriceObservation>> {
        let mut result = Vec::new();
        for coin in coins {
            for exchange in exchanges {
                if let Some(observation) = self.latest(coin, exchange).await? {
                    result.push(observation);
                }
            }
        }
        Ok(result)
    }
}
