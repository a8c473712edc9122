//! Simple example of using proxyman.
//!
//! Requires a local Redis server and `WEBSHARE_API_KEY` in the environment.

use proxyman::{ManagerConfig, PoolManager, ProxyPoolMiddleware, Strategy};
use reqwest_middleware::ClientBuilder;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ManagerConfig::builder()
        .api_key(std::env::var("WEBSHARE_API_KEY")?)
        .amount(25)
        .fail_threshold(3)
        .strategy(Strategy::Smart)
        .retry_count(2)
        .build();

    println!("Initializing proxy pool...");
    let manager = Arc::new(PoolManager::connect(config).await?);
    manager.initialize().await?;

    let client = ClientBuilder::new(reqwest::Client::new())
        .with(ProxyPoolMiddleware::new(manager.clone()))
        .build();

    println!("Sending request...");
    let response = client.get("https://httpbin.org/ip").send().await?;

    println!("Status: {}", response.status());
    println!("Response: {}", response.text().await?);

    let stats = manager.get_stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
