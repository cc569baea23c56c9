//! Error types for vital-core

use thiserror::Error;

/// Result type alias using vital-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vital-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Credential store error
    #[error("Auth error: {0}")]
    Auth(String),

    /// The remote account no longer exists; all sync must stop
    #[error("Account removed, stopping all sync tasks")]
    AccountRemoved,

    /// The sync cycle exceeded its wall-clock budget
    #[error("Sync cycle timed out")]
    Timeout,

    /// Platform provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
