use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ga4_pageviews::server::build_app;
use ga4_pageviews::{AnalyticsClient, PageviewFetcher, ServerConfig, ServiceAccountKey};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ga4_pageviews=info,server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Read configuration from environment, with `.env` values filling the gaps
    dotenv::dotenv().ok();
    let config = ServerConfig::from_env();

    // Credentials must load before the port is bound
    let key = ServiceAccountKey::from_file(&config.credentials_path)
        .inspect_err(|e| tracing::error!("Error loading service account key file: {}", e))
        .context("Failed to load service account key")?;
    let client = AnalyticsClient::with_config(key, config.analytics_config())
        .context("Failed to initialize analytics client")?;
    tracing::info!(
        "Successfully loaded service account key for: {}",
        client.client_email()
    );
    let fetcher =
        PageviewFetcher::new(Arc::new(client)).with_max_concurrency(config.max_concurrency);

    // Build Axum app with routes
    let app = build_app(fetcher);

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("GA4 Pageviews API is running on {}", addr);
    tracing::info!("Service account: {}", config.credentials_path.display());
    tracing::info!(
        "Try accessing: http://localhost:{}/api/pageviews?ids=ID1,ID2,ID3",
        config.port
    );

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
