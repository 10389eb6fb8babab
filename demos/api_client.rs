/// Example HTTP client demonstrating how to call the GA4 Pageviews server API
///
/// Run the server first:
/// ```bash
/// GOOGLE_APPLICATION_CREDENTIALS=key.json cargo run --bin server
/// ```
///
/// Then run this example:
/// ```bash
/// PROPERTY_IDS=123456789,987654321 cargo run --example api_client
/// ```

use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest {
    property_ids: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct SingleResponse {
    pageviews: u64,
}

#[derive(Deserialize, Debug)]
struct BatchResponse {
    properties: Vec<PropertyData>,
    total: u64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PropertyData {
    property_id: String,
    property_name: String,
    pageviews_formatted: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct HealthResponse {
    status: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let property_ids: Vec<String> = std::env::var("PROPERTY_IDS")
        .unwrap_or_else(|_| "123456789,987654321".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let client = reqwest::Client::new();

    println!("=== GA4 Pageviews API Client Demo ===\n");

    // 1. Health Check
    println!("1. Checking server health...");
    let health: HealthResponse = client
        .get(format!("{}/healthcheck", base_url))
        .send()
        .await?
        .json()
        .await?;
    println!("   Server status: {}\n", health.status);

    // 2. Single property (legacy shape)
    println!("2. Fetching pageviews for {}...", property_ids[0]);
    let response = client
        .get(format!("{}/api/pageviews/{}", base_url, property_ids[0]))
        .send()
        .await?;
    if response.status().is_success() {
        let result: SingleResponse = response.json().await?;
        println!("   Pageviews: {}\n", result.pageviews);
    } else {
        println!("   Error ({}): {}\n", response.status(), response.text().await?);
    }

    // 3. Batch via query string
    println!("3. Fetching batch via GET...");
    let response = client
        .get(format!("{}/api/pageviews", base_url))
        .query(&[("ids", property_ids.join(","))])
        .send()
        .await?;
    print_batch(response).await?;

    // 4. Batch via JSON body
    println!("4. Fetching batch via POST...");
    let response = client
        .post(format!("{}/api/pageviews", base_url))
        .json(&BatchRequest {
            property_ids: property_ids.clone(),
        })
        .send()
        .await?;
    print_batch(response).await?;

    println!("=== Demo Complete ===");

    Ok(())
}

async fn print_batch(response: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !response.status().is_success() {
        println!("   Error ({}): {}\n", response.status(), response.text().await?);
        return Ok(());
    }

    let result: BatchResponse = response.json().await?;
    for (i, property) in result.properties.iter().enumerate() {
        match (&property.pageviews_formatted, &property.error) {
            (Some(formatted), _) => println!(
                "   [{}] {} ({}) - {}",
                i + 1,
                property.property_name,
                property.property_id,
                formatted
            ),
            (None, error) => println!(
                "   [{}] {} ({}) - error: {}",
                i + 1,
                property.property_name,
                property.property_id,
                error.as_deref().unwrap_or("unknown")
            ),
        }
    }
    println!("   Total: {}\n", result.total);
    Ok(())
}
