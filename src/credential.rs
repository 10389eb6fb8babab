//! Service account credentials.
//!
//! Loads the Google service account JSON key used to sign token requests.

use std::path::Path;

use jsonwebtoken::EncodingKey;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Fields of a service account key file that we use.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Read and parse a key file. Also checks that the private key is a usable RSA PEM.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let key: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        key.encoding_key()?;
        Ok(key)
    }

    pub fn encoding_key(&self) -> Result<EncodingKey, ConfigError> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|source| {
            ConfigError::PrivateKey {
                client_email: self.client_email.clone(),
                source,
            }
        })
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}
