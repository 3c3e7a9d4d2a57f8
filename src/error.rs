//! Error types for the Twitter API client.

use thiserror::Error;

/// Result type for Twitter client operations.
pub type Result<T> = std::result::Result<T, TwitterError>;

/// Error types for Twitter client operations.
#[derive(Error, Debug)]
pub enum TwitterError {
    /// A signed operation was attempted before credentials were set.
    #[error("No Twitter credentials found. Set credentials first using set_credentials()")]
    NotAuthenticated,

    /// The caller supplied unusable input (e.g. an empty stream filter).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Network or connection failure. Never retried.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A payload could not be deserialized.
    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The rendered Authorization header is not a valid header value.
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TwitterError {
    /// Whether the error stems from caller input rather than client state.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
