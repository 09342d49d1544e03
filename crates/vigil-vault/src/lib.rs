//! Vigil Vault - Content-Access API Client
//!
//! This crate wraps the vault's HTTP read API:
//! - Read: full file content
//! - Property: a single named header property of a file
//! - Files: listing of a folder
//! - Stat: file metadata, including the modification timestamp
//!
//! Every operation can fail (network error, missing resource). Callers are
//! expected to treat any failure as "skip this check" rather than aborting a
//! whole scheduling pass.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;

pub use client::{VaultClient, VaultConfig};
pub use error::{Result, VaultError};

use async_trait::async_trait;

/// Read-only view of the vault, the seam between the scheduler and the
/// content-access service.
///
/// Production code uses [`VaultClient`]; tests substitute an in-memory stub.
#[async_trait]
pub trait VaultRead: Send + Sync {
    /// Read the full content of a vault file.
    async fn read(&self, path: &str) -> Result<String>;

    /// Read a single header property from a vault file.
    async fn read_property(&self, name: &str, path: &str) -> Result<String>;

    /// List files in a vault folder, as vault-relative paths.
    async fn list_files(&self, folder: &str) -> Result<Vec<String>>;

    /// Modification time of a vault file in Unix milliseconds.
    async fn mtime(&self, path: &str) -> Result<i64>;

    /// Check whether the vault API is reachable.
    async fn is_available(&self) -> bool;
}
