//! Mock media host for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::credentials::ServiceKind;
use crate::media_host::{MediaHost, MediaHostError, UploadReceipt, UploadRequest};
use crate::records::Visibility;

/// A recorded upload for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub file: PathBuf,
    pub title: String,
    pub visibility: Visibility,
    /// Whether the file was on disk when the upload started.
    pub file_existed: bool,
    pub access_token: String,
    pub success: bool,
}

/// Mock implementation of the MediaHost trait.
///
/// Uploads succeed with ids `mock-1`, `mock-2`, ... unless failures have been
/// queued with [`MockMediaHost::fail_next`].
#[derive(Debug, Clone)]
pub struct MockMediaHost {
    kind: ServiceKind,
    uploads: Arc<RwLock<Vec<RecordedUpload>>>,
    failures: Arc<RwLock<VecDeque<String>>>,
    upload_delay: Arc<RwLock<Duration>>,
}

impl Default for MockMediaHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMediaHost {
    /// Create a mock YouTube host.
    pub fn new() -> Self {
        Self::for_kind(ServiceKind::YouTube)
    }

    pub fn for_kind(kind: ServiceKind) -> Self {
        Self {
            kind,
            uploads: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(VecDeque::new())),
            upload_delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Queue `count` failing uploads with the given message.
    pub async fn fail_next(&self, count: usize, message: &str) {
        let mut failures = self.failures.write().await;
        for _ in 0..count {
            failures.push_back(message.to_string());
        }
    }

    /// Simulated upload time.
    pub async fn set_upload_delay(&self, delay: Duration) {
        *self.upload_delay.write().await = delay;
    }

    /// Get all recorded uploads.
    pub async fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.read().await.clone()
    }

    /// Number of upload attempts.
    pub async fn upload_count(&self) -> usize {
        self.uploads.read().await.len()
    }
}

#[async_trait]
impl MediaHost for MockMediaHost {
    fn kind(&self) -> ServiceKind {
        self.kind
    }

    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, MediaHostError> {
        let delay = *self.upload_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let file_existed = request.file.exists();
        let failure = self.failures.write().await.pop_front();

        let mut uploads = self.uploads.write().await;
        let success = file_existed && failure.is_none();
        uploads.push(RecordedUpload {
            file: request.file.clone(),
            title: request.title.clone(),
            visibility: request.visibility,
            file_existed,
            access_token: request.credential.access_token.clone(),
            success,
        });

        if !file_existed {
            return Err(MediaHostError::InvalidRequest(format!(
                "file not found: {}",
                request.file.display()
            )));
        }
        if let Some(message) = failure {
            return Err(MediaHostError::Api {
                service: "mock",
                status: 503,
                message,
            });
        }

        let remote_id = format!("mock-{}", uploads.len());
        Ok(UploadReceipt {
            remote_url: format!("https://media.example/watch/{}", remote_id),
            remote_id,
        })
    }
}
