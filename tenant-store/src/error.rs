//! Error types for the storage router
//!
//! Internal errors use thiserror and carry their cause so they can be logged.
//! `StorageError` is the small public taxonomy handed back to callers; it
//! never carries a cause.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage root is read-only: {0}")]
    ReadOnly(String),

    #[error("Storage root already registered: {0}")]
    DuplicateRoot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Errors returned by the public storage service operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("upload feature is disabled")]
    FeatureDisabled,

    #[error("storage does not support this operation")]
    UnsupportedOperation,

    #[error("request validation failed")]
    ValidationFailed,

    #[error("file exists")]
    Conflict,

    #[error("not found")]
    NotFound,

    #[error("internal storage error")]
    Internal,
}

impl serde::Serialize for StorageError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
