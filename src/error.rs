// src/error.rs

//! Unified error handling for the catalog archive.

use std::fmt;

use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The catalog source failed to answer a request
    #[error("Remote error for {context}: {message}")]
    Remote {
        context: String,
        message: String,
        /// Network-level failures are transient; error payloads and parse failures are not
        transient: bool,
    },

    /// Every namespace failed during a crawl
    #[error("No data: every namespace failed to download")]
    NoData,

    /// A backup record could not be written or read
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed query input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A crawl was interrupted by shutdown
    #[error("Crawl cancelled")]
    Cancelled,

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a remote error with context.
    pub fn remote(context: impl Into<String>, message: impl fmt::Display, transient: bool) -> Self {
        Self::Remote {
            context: context.into(),
            message: message.to_string(),
            transient,
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether a remote failure may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Remote { transient, .. } => *transient,
            Self::Http(_) => true,
            _ => false,
        }
    }

    /// Whether this error came from durable storage.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}
