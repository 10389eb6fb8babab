use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::{ADMIN_API_URL, AnalyticsConfig, DATA_API_URL, DEFAULT_TIMEOUT};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CREDENTIALS_FILE: &str = "service-account-key.json";

/// Server configuration, read from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Service account key file (`GOOGLE_APPLICATION_CREDENTIALS`)
    pub credentials_path: PathBuf,
    /// Timeout applied to every outbound API call
    pub timeout: Duration,
    /// Max in-flight fetches per batch; `None` is unbounded
    pub max_concurrency: Option<usize>,
    pub data_url: String,
    pub admin_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            credentials_path: non_empty("GOOGLE_APPLICATION_CREDENTIALS")
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string())
                .into(),
            timeout: non_empty("ANALYTICS_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|&secs: &u64| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            max_concurrency: non_empty("FETCH_CONCURRENCY")
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0),
            data_url: non_empty("ANALYTICS_DATA_URL").unwrap_or_else(|| DATA_API_URL.to_string()),
            admin_url: non_empty("ANALYTICS_ADMIN_URL")
                .unwrap_or_else(|| ADMIN_API_URL.to_string()),
        }
    }

    pub fn analytics_config(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            data_url: self.data_url.clone(),
            admin_url: self.admin_url.clone(),
            token_uri: None,
            timeout: self.timeout,
        }
    }
}
