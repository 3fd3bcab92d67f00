//! Error types for the media module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::Stage;

/// Errors that can occur while probing or transforming media.
#[derive(Debug, Error)]
pub enum MediaError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The file has no decodable video stream or reports nonsensical values.
    #[error("Unreadable media {path}: {reason}")]
    UnreadableMedia { path: PathBuf, reason: String },

    /// A transform stage failed.
    #[error("{stage} failed: {reason}")]
    Transform {
        stage: Stage,
        reason: String,
        stderr: Option<String>,
    },

    /// The orientation label is not one of square, portrait, landscape.
    #[error("Unsupported orientation: {0}")]
    UnsupportedOrientation(String),

    /// A stage exceeded the configured timeout.
    #[error("{stage} timed out after {timeout_secs} seconds")]
    Timeout { stage: Stage, timeout_secs: u64 },

    /// I/O error during a transform.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Creates a new unreadable media error.
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnreadableMedia {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new transform error with optional stderr output.
    pub fn transform(stage: Stage, reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Transform {
            stage,
            reason: reason.into(),
            stderr,
        }
    }

    /// Whether re-running the chain on the same input may succeed.
    ///
    /// Bad input files and unknown orientations need a different request;
    /// stage failures, timeouts and I/O hiccups do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transform { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(MediaError::transform(Stage::Scrub, "boom", None).is_retryable());
        assert!(MediaError::Timeout {
            stage: Stage::Uniquify,
            timeout_secs: 10
        }
        .is_retryable());
        assert!(!MediaError::unreadable("/a.mp4", "no video stream").is_retryable());
        assert!(!MediaError::UnsupportedOrientation("diagonal".to_string()).is_retryable());
    }

    #[test]
    fn test_transform_message_names_stage() {
        let err = MediaError::transform(Stage::Synthesize, "exit code 1", None);
        assert_eq!(err.to_string(), "synthesize failed: exit code 1");
    }
}
