//! Error types for rate sync, rate persistence and upload storage.

use thiserror::Error;

/// Failures that abort a whole rate sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Quote source unreachable, timed out, answered with a non-success
    /// status or returned a body that does not parse.
    #[error("External source error: {0}")]
    ExternalSource(String),

    /// Spread or allow-list configuration rejected before any fetch.
    #[error("Invalid rate policy: {0}")]
    InvalidPolicy(String),
}

/// Failures of a single rate store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Currency already exists: {0}")]
    Duplicate(String),

    #[error("Foreign exchange rate not found: {0}")]
    NotFound(String),

    #[error("Invalid exchange rate: {0}")]
    Invalid(String),

    #[error("Rate store backend error: {0}")]
    Backend(#[from] fjall::Error),

    #[error("Rate record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the upload artifact manager.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The payload could not be persisted. Partial data is removed first.
    #[error("Failed to write artifact {key}: {reason}")]
    StorageWrite { key: String, reason: String },

    /// The artifact is already gone. Swallowed by `delete` and `replace`.
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid upload category: {0}")]
    InvalidCategory(String),

    #[error("Invalid artifact locator: {0}")]
    InvalidLocator(String),

    #[error("I/O error on artifact {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

pub type SyncResult<T> = Result<T, SyncError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type UploadResult<T> = Result<T, UploadError>;
