//! Error types for vigil-vault

use thiserror::Error;

/// Vault API error type
#[derive(Debug, Error)]
pub enum VaultError {
    /// Transport-level failure (connection refused, timeout, TLS)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("vault returned {status} for '{path}'")]
    Status {
        /// HTTP status code
        status: u16,
        /// Vault path the request was about
        path: String,
    },

    /// The API answered, but the payload was not in the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, VaultError>;
