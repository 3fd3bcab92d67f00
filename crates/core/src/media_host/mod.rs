//! Media hosts: external services that accept a rendered video.

mod error;
mod traits;
mod types;
mod youtube;

pub use error::MediaHostError;
pub use traits::MediaHost;
pub use types::{UploadReceipt, UploadRequest};
pub use youtube::{YouTubeConfig, YouTubeHost, UPLOAD_CHUNK_GRANULARITY};
