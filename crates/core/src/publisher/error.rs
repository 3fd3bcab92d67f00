//! Error types for the publisher.

use thiserror::Error;

use crate::credentials::ServiceKind;
use crate::records::{PublishStatus, StoreError};

/// Errors returned by publisher operations.
///
/// A rejected upload is not an error here: it is recorded on the job, which
/// ends in `error` and can be retried.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No usable credential for the media host.
    #[error("No usable {kind} credential: {reason}")]
    CredentialMissing { kind: ServiceKind, reason: String },

    /// The job, its rendition or its source does not exist for this user.
    #[error("Publish job not found: {0}")]
    JobNotFound(String),

    /// The job is not in a state that allows the operation.
    #[error("Publish job {job_id} is {status}")]
    InvalidState {
        job_id: String,
        status: PublishStatus,
    },

    /// Record storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
