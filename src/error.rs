// src/error.rs

//! Unified error handling for the monitor.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
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

    /// A configured extraction pattern did not compile
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Page could not be fetched, or came back blocked/empty
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Extraction produced a result that cannot be trusted
    #[error("Extraction anomaly for {url}: {message}")]
    Extraction { url: String, message: String },

    /// A state document could not be written
    #[error("Persistence error for {document}: {message}")]
    Persistence { document: String, message: String },

    /// Notification endpoint refused or could not be reached
    #[error("Notification failed (status {status:?}): {message}")]
    Notify {
        status: Option<u16>,
        message: String,
    },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a source.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction anomaly for a source.
    pub fn extraction(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error for a state document.
    pub fn persistence(document: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Persistence {
            document: document.into(),
            message: message.to_string(),
        }
    }

    /// Create a notification error.
    pub fn notify(status: Option<u16>, message: impl fmt::Display) -> Self {
        Self::Notify {
            status,
            message: message.to_string(),
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Fetch { .. } => true,
            Self::Notify { status, .. } => match status {
                Some(code) => *code == 429 || *code >= 500,
                None => true,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message() {
        let err = AppError::fetch("https://example.com", "timed out");
        assert_eq!(
            err.to_string(),
            "Fetch failed for https://example.com: timed out"
        );
    }

    #[test]
    fn test_notify_transient_status() {
        assert!(AppError::notify(Some(503), "unavailable").is_transient());
        assert!(AppError::notify(Some(429), "slow down").is_transient());
        assert!(!AppError::notify(Some(400), "bad request").is_transient());
        assert!(AppError::notify(None, "connection refused").is_transient());
    }

    #[test]
    fn test_config_error_not_transient() {
        assert!(!AppError::config("missing endpoint").is_transient());
    }
}
