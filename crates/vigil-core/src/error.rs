//! Error types for vigil-core
//!
//! Per-job and per-resource failures are isolated at their own granularity
//! (see the scheduler's decision types); the variants here are what crosses a
//! component boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed cron expression; fatal to one job's cron check only
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// Vault read API failure; callers treat this as "skip this check"
    #[error("vault error: {0}")]
    Vault(#[from] vigil_vault::VaultError),

    /// The execution backend exceeded the wall-clock limit
    #[error("execution timed out after {0}s")]
    ExecutionTimeout(u64),

    /// The execution backend could not be invoked
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Failure to read or write a record, the tracker table, or a partition
    #[error("persistence error: {0}")]
    Persist(#[from] std::io::Error),

    /// A record's header block could not be parsed or serialized
    #[error("record header error: {0}")]
    Header(#[from] serde_yaml::Error),

    /// The tracker table could not be parsed or serialized
    #[error("state table error: {0}")]
    State(#[from] serde_json::Error),

    /// Another evaluator or processor pass holds the lock
    #[error("another pass holds the lock at {}", .0.display())]
    LockHeld(PathBuf),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
