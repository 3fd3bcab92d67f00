//! Errors returned by media hosts.

use thiserror::Error;

/// Errors that can occur when publishing to a media host.
#[derive(Debug, Error)]
pub enum MediaHostError {
    /// The host answered with a non-success status. Body is kept verbatim.
    #[error("{service} API error: {status} - {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Token refresh was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Connection or protocol failure.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// Response did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The upload request itself is unusable.
    #[error("Invalid upload request: {0}")]
    InvalidRequest(String),

    /// Reading the file to upload failed.
    #[error("File error: {0}")]
    File(#[from] std::io::Error),
}

impl From<reqwest::Error> for MediaHostError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MediaHostError::Timeout
        } else {
            MediaHostError::Transport(e.to_string())
        }
    }
}
