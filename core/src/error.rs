// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors reported by cache and remote stores.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient network or service failure, worth retrying later.
    #[error("Calendar is unavailable: {0}")]
    Unavailable(String),

    /// The store refused the operation (validation, permissions).
    #[error("Operation rejected: {0}")]
    Rejected(String),

    /// The store does not implement the requested capability.
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// The item does not exist in the store.
    #[error("Item not found: {0}")]
    NotFound(String),

    /// The backing storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Whether the mutation should be demoted to an offline write instead of failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound(e.to_string()),
            e => Self::Storage(e.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(format!("Failed to run migrations: {e}"))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Terminal status of a synchronization, shared by every coalesced request.
pub type SyncStatus = Result<(), StoreError>;

/// Errors raised while loading or normalizing configuration.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A path could not be expanded.
    #[error("Invalid path: {0}")]
    Path(String),
}
