//! Web interface
//!
//! Three routes: `/` redirects to the landing page, `/index` serves it, and
//! `/get_coin_status` returns the latest observation per tracked pair as
//! `{coin: {exchange: {price, updated_at}}}`.

use crate::config::Config;
use crate::store::Store;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{debug, error, info};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(default_page))
        .route("/index", get(index_page))
        .route("/get_coin_status", get(get_coin_status))
        .with_state(state)
}

/// Bind and serve until the process terminates
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Web interface listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .context("Web server terminated")?;
    Ok(())
}

async fn default_page() -> Redirect {
    Redirect::to("/index")
}

async fn index_page() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn get_coin_status(State(state): State<AppState>) -> Response {
    match coin_status_snapshot(&state).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            error!("Failed to assemble coin status: {:#}", e);
            let body = json!({ "error": e.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Assemble the latest price per tracked pair. Every tracked coin appears as
/// a key; pairs without observations are logged and omitted.
async fn coin_status_snapshot(state: &AppState) -> Result<Value> {
    let observations = state
        .store
        .latest_all(&state.config.coins, &state.config.exchanges)
        .await?;

    let mut result = Map::new();
    for coin in &state.config.coins {
        result.insert(coin.clone(), Value::Object(Map::new()));
    }

    for observation in observations {
        if let Some(Value::Object(exchanges)) = result.get_mut(&observation.coin) {
            exchanges.insert(
                observation.exchange.clone(),
                json!({
                    "price": observation.price,
                    "updated_at": observation.updated_at.format(TIMESTAMP_FORMAT).to_string(),
                }),
            );
        }
    }

    for coin in &state.config.coins {
        for exchange in &state.config.exchanges {
            if result[coin].get(exchange).is_none() {
                debug!("No observation yet for {} on {}", coin, exchange);
            }
        }
    }

    Ok(Value::Object(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PriceSample;
    use chrono::{TimeZone, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    fn test_config(coins: &[&str], exchanges: &[&str]) -> Arc<Config> {
        Arc::new(Config {
            coins: coins.iter().map(|s| s.to_string()).collect(),
            exchanges: exchanges.iter().map(|s| s.to_string()).collect(),
            quote_currency: "USD".to_string(),
            price_api_url: "http://localhost".to_string(),
            request_timeout_secs: 5,
            poll_interval_secs: 10,
            startup_delay_secs: 0,
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            http_host: "127.0.0.1".to_string(),
            http_port: 0,
        })
    }

    async fn memory_state(config: Arc<Config>) -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Store::new(pool);
        store.init_schema().await.unwrap();
        AppState { store, config }
    }

    #[tokio::test]
    async fn test_snapshot_empty_store_keeps_coin_keys() {
        let state = memory_state(test_config(&["BTC", "ETH"], &["Kraken"])).await;
        let snapshot = coin_status_snapshot(&state).await.unwrap();
        assert_eq!(snapshot, json!({ "BTC": {}, "ETH": {} }));
    }

    #[tokio::test]
    async fn test_snapshot_formats_timestamp() {
        let state = memory_state(test_config(&["BTC"], &["Kraken"])).await;
        let updated_at = Utc.with_ymd_and_hms(2018, 3, 4, 12, 30, 45).unwrap();
        state
            .store
            .append_batch(&[PriceSample {
                coin: "BTC".to_string(),
                exchange: "Kraken".to_string(),
                price: 50000.12,
                updated_at,
            }])
            .await
            .unwrap();

        let snapshot = coin_status_snapshot(&state).await.unwrap();
        assert_eq!(
            snapshot,
            json!({
                "BTC": {
                    "Kraken": { "price": 50000.12, "updated_at": "2018-03-04 12:30:45" }
                }
            })
        );
    }
}
