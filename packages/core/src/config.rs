//! Repository Connection Configuration
//!
//! Connection settings are carried explicitly by each `Session`; nothing is read
//! from process-wide state after construction.
//!
//! # Environment
//!
//! | Variable                      | Default                              |
//! |-------------------------------|--------------------------------------|
//! | `REPOGRAPH_URL`               | `http://localhost:8080/alfresco/api` |
//! | `REPOGRAPH_TICKET`            | empty                                |
//! | `REPOGRAPH_UPLOAD_CHUNK_SIZE` | `1024`                               |
//! | `REPOGRAPH_STORE`             | `workspace://SpacesStore`            |

use crate::models::StoreRef;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONNECTION_URL: &str = "http://localhost:8080/alfresco/api";
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 1024;

/// Errors raised while interpreting configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),
}

/// Settings one session needs to reach the repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// Base URL of the repository API
    pub connection_url: String,

    /// Opaque credential issued by the authentication service
    pub ticket: String,

    /// Bytes written per chunk when streaming an upload
    pub upload_chunk_size: usize,

    /// Store new sessions resolve bare ids against
    pub default_store: StoreRef,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            connection_url: DEFAULT_CONNECTION_URL.to_string(),
            ticket: String::new(),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            default_store: StoreRef::spaces_store(),
        }
    }
}

impl RepositoryConfig {
    pub fn new(connection_url: impl Into<String>, ticket: impl Into<String>) -> Self {
        Self {
            connection_url: connection_url.into(),
            ticket: ticket.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `REPOGRAPH_*` environment variables
    ///
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let connection_url = std::env::var("REPOGRAPH_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.connection_url);

        let ticket = std::env::var("REPOGRAPH_TICKET").unwrap_or(defaults.ticket);

        let upload_chunk_size = std::env::var("REPOGRAPH_UPLOAD_CHUNK_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(defaults.upload_chunk_size);

        let default_store = std::env::var("REPOGRAPH_STORE")
            .ok()
            .and_then(|v| v.parse::<StoreRef>().ok())
            .unwrap_or(defaults.default_store);

        Self {
            connection_url,
            ticket,
            upload_chunk_size,
            default_store,
        }
    }

    pub fn with_ticket(mut self, ticket: impl Into<String>) -> Self {
        self.ticket = ticket.into();
        self
    }

    pub fn with_upload_chunk_size(mut self, size: usize) -> Self {
        self.upload_chunk_size = size.max(1);
        self
    }

    /// Parsed connection URL
    ///
    /// Only `http` and `https` URLs with a host are accepted.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.connection_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.connection_url, e)))?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(ConfigError::InvalidUrl(self.connection_url.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RepositoryConfig::default();
        assert_eq!(config.connection_url, DEFAULT_CONNECTION_URL);
        assert_eq!(config.upload_chunk_size, 1024);
        assert_eq!(config.default_store, StoreRef::spaces_store());
    }

    #[test]
    fn test_base_url() {
        let config = RepositoryConfig::new("http://localhost:8080/alfresco/api", "T");
        let url = config.base_url().unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port_or_known_default(), Some(8080));
        assert_eq!(url.path(), "/alfresco/api");

        let secure = RepositoryConfig::new("https://repo.example.com/api", "T");
        assert_eq!(secure.base_url().unwrap().port_or_known_default(), Some(443));
    }

    #[test]
    fn test_base_url_rejects_garbage() {
        for bad in ["localhost:8080", "ftp://host/x", "http://host:99999/", "not a url"] {
            assert!(
                RepositoryConfig::new(bad, "T").base_url().is_err(),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_chunk_size_floor() {
        let config = RepositoryConfig::default().with_upload_chunk_size(0);
        assert_eq!(config.upload_chunk_size, 1);
    }
}
