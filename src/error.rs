//! Error handling for the espace scanner
//!
//! Configuration problems are fatal and reported before any scanning starts;
//! everything that can go wrong while talking to a single device is handled
//! at that address's boundary and never escalates here.

use thiserror::Error;

/// Main error type for scan operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid IP range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Accounts list error: {0}")]
    AccountsError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Permission denied: {0}")]
    PermissionError(String),

    #[error("Timeout error")]
    TimeoutError,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Output error: {0}")]
    OutputError(String),
}

impl From<std::net::AddrParseError> for ScanError {
    fn from(e: std::net::AddrParseError) -> Self {
        ScanError::InvalidAddress(e.to_string())
    }
}

impl From<csv::Error> for ScanError {
    fn from(e: csv::Error) -> Self {
        ScanError::AccountsError(e.to_string())
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        ScanError::NetworkError(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ScanError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ScanError::TimeoutError
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(e: toml::de::Error) -> Self {
        ScanError::ConfigError(e.to_string())
    }
}

/// Whether an error may abort the whole run or only the current address
pub fn is_fatal(error: &ScanError) -> bool {
    matches!(
        error,
        ScanError::InvalidAddress(_)
            | ScanError::InvalidRange(_)
            | ScanError::ConfigError(_)
            | ScanError::AccountsError(_)
    )
}
