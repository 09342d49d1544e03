//! HTTP client for the vault read API
//!
//! The vault exposes a small query-string API:
//! `GET /read?file=..`, `GET /property?name=..&file=..`,
//! `GET /files?folder=..`, `GET /stat?file=..` and `GET /vault` (health).
//! Stat responses are `key\tvalue` lines; the `modified` key carries the
//! modification time in Unix milliseconds.

use crate::error::{Result, VaultError};
use crate::VaultRead;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default vault endpoint
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9999";

/// Per-request timeout; one stuck resource must not stall a whole pass
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Vault client configuration
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Endpoint base URL
    pub base_url: String,
    /// Bearer token; empty means unauthenticated
    pub token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl VaultConfig {
    /// Create configuration from `VAULT_API_URL` / `VAULT_API_TOKEN`.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("VAULT_API_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            token: std::env::var("VAULT_API_TOKEN").unwrap_or_default(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the endpoint base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }
}

/// Vault read API client
pub struct VaultClient {
    client: Client,
    config: VaultConfig,
}

impl VaultClient {
    /// Create a new client.
    pub fn new(config: VaultConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(VaultConfig::from_env())
    }

    async fn get_text(&self, endpoint: &str, query: &[(&str, &str)], path: &str) -> Result<String> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut request = self.client.get(&url).query(query);
        if !self.config.token.is_empty() {
            request = request.bearer_auth(&self.config.token);
        }

        debug!(endpoint, path, "vault request");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VaultError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

/// Parse `key\tvalue` lines into the value for `wanted`.
fn stat_value(raw: &str, wanted: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let (key, value) = line.split_once('\t')?;
        (key == wanted).then(|| value.to_string())
    })
}

#[async_trait]
impl VaultRead for VaultClient {
    async fn read(&self, path: &str) -> Result<String> {
        self.get_text("read", &[("file", path)], path).await
    }

    async fn read_property(&self, name: &str, path: &str) -> Result<String> {
        self.get_text("property", &[("name", name), ("file", path)], path)
            .await
    }

    async fn list_files(&self, folder: &str) -> Result<Vec<String>> {
        let raw = self.get_text("files", &[("folder", folder)], folder).await?;
        Ok(raw
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect())
    }

    async fn mtime(&self, path: &str) -> Result<i64> {
        let raw = self.get_text("stat", &[("file", path)], path).await?;
        let value = stat_value(&raw, "modified").ok_or_else(|| {
            VaultError::InvalidResponse(format!("stat for '{}' has no 'modified' field", path))
        })?;
        value.parse().map_err(|_| {
            VaultError::InvalidResponse(format!("non-numeric mtime '{}' for '{}'", value, path))
        })
    }

    async fn is_available(&self) -> bool {
        self.get_text("vault", &[], "").await.is_ok()
    }
}
