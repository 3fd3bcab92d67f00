//! Error types for the rendition pipeline.

use thiserror::Error;

use crate::credentials::ServiceKind;
use crate::media::MediaError;
use crate::records::StoreError;

/// Errors that abort a whole pipeline run.
///
/// Failures inside one orientation chain never surface here; they become
/// `error` entries of the manifest.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable credential for the target media host.
    #[error("No usable {kind} credential: {reason}")]
    CredentialMissing { kind: ServiceKind, reason: String },

    /// The uploaded file could not be probed.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Persisting the source failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Copying the upload into storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
