//! Error types for portfolio operations.

use thiserror::Error;

/// Main error type for the portfolio library.
#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Insufficient data: need at least {required} values, got {available}")]
    InsufficientData { required: usize, available: usize },
}

/// Coarse classification of a [`PortfolioError`], for front ends that render
/// a message per category instead of per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Io,
    Data,
    Config,
}

impl PortfolioError {
    /// Shorthand for an [`PortfolioError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        PortfolioError::InvalidArgument(message.into())
    }

    /// Shorthand for a [`PortfolioError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        PortfolioError::NotFound(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PortfolioError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PortfolioError::NotFound(_) => ErrorKind::NotFound,
            PortfolioError::IoError(_) => ErrorKind::Io,
            PortfolioError::CsvError(_)
            | PortfolioError::JsonError(_)
            | PortfolioError::MarketData(_)
            | PortfolioError::InsufficientData { .. } => ErrorKind::Data,
            PortfolioError::TomlError(_) | PortfolioError::ConfigError(_) => ErrorKind::Config,
        }
    }
}

/// Result type alias for portfolio operations.
pub type Result<T> = std::result::Result<T, PortfolioError>;
