//! Trait definitions for media hosts.

use async_trait::async_trait;

use super::error::MediaHostError;
use super::types::{UploadReceipt, UploadRequest};
use crate::credentials::ServiceKind;

/// An external service that accepts a video file and returns its remote
/// identity.
///
/// Implementations must stream large files in chunks rather than buffering
/// them whole.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// The credential kind this host authenticates with.
    fn kind(&self) -> ServiceKind;

    /// Uploads `request.file` and returns the remote id and URL.
    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, MediaHostError>;
}
