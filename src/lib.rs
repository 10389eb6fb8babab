pub mod client;
pub mod config;
pub mod credential;
pub mod credential_cache;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod server;
pub mod types;

pub use client::{AnalyticsApi, AnalyticsClient, AnalyticsConfig};
pub use config::ServerConfig;
pub use credential::ServiceAccountKey;
pub use error::{ConfigError, FetchError};
pub use fetcher::PageviewFetcher;
pub use format::format_with_commas;
pub use types::{BatchResponse, DateRange, PropertyResult};
