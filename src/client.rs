use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::credential::ServiceAccountKey;
use crate::credential_cache::CredentialCache;
use crate::error::{ConfigError, FetchError};
use crate::types::{AdminProperty, DateRange, GoogleErrorResponse, RunReportRequest, RunReportResponse};

pub const DATA_API_URL: &str = "https://analyticsdata.googleapis.com";
pub const ADMIN_API_URL: &str = "https://analyticsadmin.googleapis.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The two remote operations the fetchers depend on.
#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    /// Run a `screenPageViews` report for one property over `range`.
    async fn run_report(
        &self,
        property_id: &str,
        range: DateRange,
    ) -> Result<RunReportResponse, FetchError>;

    /// Fetch a property's Admin API metadata.
    async fn get_property(&self, property_id: &str) -> Result<AdminProperty, FetchError>;
}

/// Configuration for AnalyticsClient
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Data API base URL
    pub data_url: String,
    /// Admin API base URL
    pub admin_url: String,
    /// Token endpoint override; defaults to the key file's `token_uri`
    pub token_uri: Option<String>,
    /// Per-request timeout for every outbound call
    pub timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            data_url: DATA_API_URL.to_string(),
            admin_url: ADMIN_API_URL.to_string(),
            token_uri: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// HTTP client for the GA4 Data and Admin APIs.
///
/// Cheap to clone; clones share the HTTP connection pool and the token cache.
#[derive(Clone)]
pub struct AnalyticsClient {
    http_client: Client,
    credentials: CredentialCache,
    data_url: Url,
    admin_url: Url,
}

impl AnalyticsClient {
    pub fn new(key: ServiceAccountKey) -> Result<Self, ConfigError> {
        Self::with_config(key, AnalyticsConfig::default())
    }

    pub fn with_config(key: ServiceAccountKey, config: AnalyticsConfig) -> Result<Self, ConfigError> {
        let mut credentials = CredentialCache::new(key)?;
        if let Some(token_uri) = config.token_uri {
            credentials = credentials.with_token_uri(token_uri);
        }

        let http_client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http_client,
            credentials,
            data_url: parse_base_url(&config.data_url)?,
            admin_url: parse_base_url(&config.admin_url)?,
        })
    }

    pub fn client_email(&self) -> &str {
        self.credentials.client_email()
    }

    fn endpoint(base: &Url, segments: &[&str]) -> Url {
        let mut url = base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Decode a JSON body, or classify the failure by status code
    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, FetchError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<GoogleErrorResponse>(&body) {
                Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
                _ => format!("API request failed: {} {}", status, body),
            };
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.credentials.invalidate().await;
            }
            return Err(FetchError::from_status(status, message));
        }

        serde_json::from_str(&body)
            .map_err(|e| FetchError::Upstream(format!("Failed to parse response: {}", e)))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::BaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::BaseUrl {
            url: raw.to_string(),
            reason: "not a base URL".to_string(),
        });
    }
    Ok(url)
}

#[async_trait]
impl AnalyticsApi for AnalyticsClient {
    async fn run_report(
        &self,
        property_id: &str,
        range: DateRange,
    ) -> Result<RunReportResponse, FetchError> {
        let token = self.credentials.authorize(&self.http_client).await?;
        let resource = format!("{}:runReport", property_id);
        let url = Self::endpoint(&self.data_url, &["v1beta", "properties", &resource]);

        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(&RunReportRequest::pageviews(range))
            .send()
            .await?;

        self.read_json(response).await
    }

    async fn get_property(&self, property_id: &str) -> Result<AdminProperty, FetchError> {
        let token = self.credentials.authorize(&self.http_client).await?;
        let url = Self::endpoint(&self.admin_url, &["v1alpha", "properties", property_id]);

        let response = self.http_client.get(url).bearer_auth(token).send().await?;

        self.read_json(response).await
    }
}
