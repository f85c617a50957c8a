// src/error.rs

//! Unified error handling for the exporter.

use std::fmt;

use thiserror::Error;

/// Result type alias for exporter operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed before a response was received
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

    /// The API answered 429 Too Many Requests
    #[error("Rate limited by {url}")]
    RateLimited { url: String },

    /// The API answered with a non-success status other than 429
    #[error("Unexpected status {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// An inlined resource did not match the expected record shape
    #[error("Decode error for {context}: {message}")]
    Decode { context: String, message: String },

    /// A paginated collection stopped returning items before reaching its total
    #[error("Pagination error at offset {offset}: {message}")]
    Pagination { offset: usize, message: String },

    /// A page contained a block kind the renderer does not know
    #[error("Unsupported block type '{block_type}' (block {id})")]
    UnsupportedBlock { block_type: String, id: String },

    /// An image was served with a content type we cannot name
    #[error("Unsupported image content type '{content_type}' for {url}")]
    UnsupportedImageType { content_type: String, url: String },

    /// A page needs a cover image but has no qualifying image block
    #[error("No cover image found for page '{slug}'")]
    MissingCoverImage { slug: String },

    /// A pre-fetched lookup table did not contain a referenced id
    #[error("{kind} '{id}' not found in lookup table")]
    MissingLookup { kind: String, id: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The run was interrupted before output was committed
    #[error("Export cancelled")]
    Cancelled,
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

    /// Create a decode error with context.
    pub fn decode(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a missing lookup error.
    pub fn missing_lookup(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::MissingLookup {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Whether the error signals an exhausted API quota that is worth retrying.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limited_is_retryable() {
        let limited = AppError::RateLimited {
            url: "https://api.example.com".to_string(),
        };
        assert!(limited.is_rate_limited());

        let status = AppError::Status {
            status: 500,
            url: "https://api.example.com".to_string(),
            body: String::new(),
        };
        assert!(!status.is_rate_limited());
        assert!(!AppError::config("x").is_rate_limited());
    }

    #[test]
    fn test_decode_message() {
        let err = AppError::decode("CalendarInstance 42", "missing field `starts_at`");
        assert_eq!(
            err.to_string(),
            "Decode error for CalendarInstance 42: missing field `starts_at`"
        );
    }
}
