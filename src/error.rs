//! Veilleur error types

use thiserror::Error;

/// Veilleur error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/transport failure reaching an external source
    #[error("Transport error: {0}")]
    Transport(String),

    /// A fetch or call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Bad JSON or feed entry; the offending item is skipped
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// Notification sink refused delivery
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Notification sink failure other than permission
    #[error("Notify error: {0}")]
    Notify(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for veilleur operations
pub type Result<T> = std::result::Result<T, Error>;
