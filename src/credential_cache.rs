//! Shared OAuth2 access token cache.
//!
//! The Google APIs want a bearer token obtained by exchanging a JWT signed
//! with the service account key. Tokens live for an hour, so one token is
//! shared by every request until it is close to expiry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::credential::ServiceAccountKey;
use crate::error::{ConfigError, FetchError};

pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are treated as expired
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Token cache shared across all concurrent fetches.
///
/// Readers take the read lock and reuse a fresh token. A stale or missing
/// token is refreshed under the write lock, re-checking first so that
/// concurrent callers that queued behind the refresh reuse its result.
#[derive(Clone)]
pub struct CredentialCache {
    key: Arc<ServiceAccountKey>,
    encoding_key: EncodingKey,
    token_uri: String,
    inner: Arc<RwLock<Option<AccessToken>>>,
}

impl CredentialCache {
    pub fn new(key: ServiceAccountKey) -> Result<Self, ConfigError> {
        let encoding_key = key.encoding_key()?;
        let token_uri = key.token_uri().to_string();
        Ok(Self {
            key: Arc::new(key),
            encoding_key,
            token_uri,
            inner: Arc::new(RwLock::new(None)),
        })
    }

    /// Override the token endpoint (used against local mock servers).
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Cached token if it is not about to expire.
    pub async fn get_valid_token(&self) -> Option<String> {
        let cache = self.inner.read().await;
        cache
            .as_ref()
            .filter(|t| t.is_fresh(Utc::now()))
            .map(|t| t.token.clone())
    }

    /// Return a usable access token, exchanging a new assertion if needed.
    /// Cheap to call before every upstream request.
    pub async fn authorize(&self, http_client: &Client) -> Result<String, FetchError> {
        if let Some(token) = self.get_valid_token().await {
            return Ok(token);
        }
        self.refresh_token(http_client).await
    }

    /// Exchange a fresh assertion for a token under the write lock.
    pub async fn refresh_token(&self, http_client: &Client) -> Result<String, FetchError> {
        let mut cache = self.inner.write().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(ref token) = *cache
            && token.is_fresh(Utc::now())
        {
            return Ok(token.token.clone());
        }

        tracing::debug!(client_email = %self.key.client_email, "requesting access token");

        let assertion = self.sign_assertion(Utc::now())?;
        let response = http_client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => format!("token request failed: {} {}", status, body),
            };
            return Err(if status.is_server_error() {
                FetchError::Upstream(message)
            } else {
                FetchError::Authorization(message)
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| FetchError::Upstream(format!("invalid token response: {}", e)))?;

        let access = AccessToken {
            token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        let value = access.token.clone();
        *cache = Some(access);

        tracing::debug!(expires_in = token.expires_in, "access token refreshed");
        Ok(value)
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, FetchError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: ANALYTICS_READONLY_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| FetchError::Authorization(format!("failed to sign assertion: {}", e)))
    }
}
