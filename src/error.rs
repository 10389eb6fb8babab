//! Error types shared by the client, the fetchers and the HTTP layer.

use std::path::PathBuf;

use thiserror::Error;

/// Failure loading the service account key at startup. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid key file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid private key for {client_email}: {source}")]
    PrivateKey {
        client_email: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    #[error("invalid API base URL {url}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure of a single upstream fetch, tagged by how it should surface over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream rejected the request as malformed (e.g. a bad property id).
    #[error("{0}")]
    Validation(String),
    /// Credentials were rejected or lack access to the property.
    #[error("{0}")]
    Authorization(String),
    /// Anything else: transport failures, timeouts, not found, 5xx, bad payloads.
    #[error("{0}")]
    Upstream(String),
}

impl FetchError {
    /// Classify an upstream HTTP status.
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => FetchError::Validation(message),
            401 | 403 => FetchError::Authorization(message),
            _ => FetchError::Upstream(message),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Upstream(format!("request timed out: {}", err))
        } else {
            FetchError::Upstream(err.to_string())
        }
    }
}
