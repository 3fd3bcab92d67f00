//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the external seams (media
//! toolkit, media host, credential provider), so the pipeline and publisher
//! can be exercised without ffmpeg or network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipforge_core::testing::{MockMediaHost, MockMediaToolkit, StaticCredentialProvider};
//!
//! let toolkit = MockMediaToolkit::new();
//! let host = MockMediaHost::new();
//! let credentials = StaticCredentialProvider::with_credential("u1", fixtures::youtube_credential()).await;
//!
//! // Script failures
//! host.fail_next(1, "quota exceeded").await;
//! ```

mod mock_media_host;
mod mock_toolkit;
mod static_credentials;

pub use mock_media_host::{MockMediaHost, RecordedUpload};
pub use mock_toolkit::{MockMediaToolkit, RecordedStage};
pub use static_credentials::StaticCredentialProvider;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::credentials::{Credential, ServiceKind};
    use crate::media::MediaMetrics;

    /// 1920x1080, 10 seconds, 30 fps.
    pub fn landscape_metrics() -> MediaMetrics {
        MediaMetrics {
            duration_secs: 10.0,
            width: 1920,
            height: 1080,
            fps: 30.0,
        }
    }

    /// 1080x1920, 15 seconds, 29.97 fps.
    pub fn portrait_metrics() -> MediaMetrics {
        MediaMetrics {
            duration_secs: 15.0,
            width: 1080,
            height: 1920,
            fps: 30000.0 / 1001.0,
        }
    }

    /// A YouTube credential with an OAuth client attached.
    pub fn youtube_credential() -> Credential {
        Credential::new(ServiceKind::YouTube, "ya29.test-access", "1//test-refresh")
            .with_client("client-id.apps.googleusercontent.com", "client-secret")
    }

    /// Write a small stand-in video file and return its path.
    pub async fn write_video(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, vec![0u8; 4096])
            .await
            .expect("write test video");
        path
    }
}
