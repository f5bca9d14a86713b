use anyhow::{Context, Result};
use coinwatch::{web, Collector, Config, PriceClient, Scheduler, Store};
use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    info!("Starting coinwatch...");

    let config = Arc::new(Config::from_env()?);
    info!(
        "Tracking {} coins across {} exchanges in {}",
        config.coins.len(),
        config.exchanges.len(),
        config.quote_currency
    );

    let store = Store::connect(&config.database_url, config.db_max_connections).await?;
    store.init_schema().await?;

    let client = PriceClient::new(
        config.price_api_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    );
    let collector = Collector::new(client, store.clone(), config.clone());

    let mut scheduler = Scheduler::new(
        Duration::from_secs(config.poll_interval_secs),
        Duration::from_secs(config.startup_delay_secs),
    );
    scheduler.start(move || {
        let collector = collector.clone();
        async move { collector.run().await }
    });

    let addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port)
        .parse()
        .context("Invalid HTTP_HOST/HTTP_PORT")?;

    web::serve(web::AppState { store, config }, addr).await
}
