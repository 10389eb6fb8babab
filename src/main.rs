use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use ga4_pageviews::server::split_ids;
use ga4_pageviews::{
    AnalyticsClient, BatchResponse, PageviewFetcher, ServerConfig, ServiceAccountKey,
    format_with_commas,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <property_ids>", args[0]);
        eprintln!("  property_ids: comma-separated GA4 property IDs (e.g., 123456789,987654321)");
        eprintln!("  credentials: GOOGLE_APPLICATION_CREDENTIALS (default: service-account-key.json)");
        std::process::exit(1);
    }

    // Parse comma-separated property IDs
    let property_ids = split_ids(&args[1]);
    if property_ids.is_empty() {
        eprintln!("Error: No property IDs provided");
        std::process::exit(1);
    }

    dotenv::dotenv().ok();
    let config = ServerConfig::from_env();
    let key = ServiceAccountKey::from_file(&config.credentials_path)
        .context("Failed to load service account key")?;
    let client = AnalyticsClient::with_config(key, config.analytics_config())?;
    let fetcher =
        PageviewFetcher::new(Arc::new(client)).with_max_concurrency(config.max_concurrency);

    println!("Fetching pageviews for {} property(ies)...", property_ids.len());
    let batch = BatchResponse::new(fetcher.fetch_many(&property_ids).await);

    for property in &batch.properties {
        match (&property.pageviews_formatted, &property.error) {
            (Some(formatted), _) => println!(
                "{} ({}): {}",
                property.property_name, property.property_id, formatted
            ),
            (None, Some(error)) => println!(
                "{} ({}): error: {}",
                property.property_name, property.property_id, error
            ),
            (None, None) => println!(
                "{} ({}): N/A",
                property.property_name, property.property_id
            ),
        }
    }

    println!("\nTotal: {}", format_with_commas(batch.total));
    Ok(())
}
