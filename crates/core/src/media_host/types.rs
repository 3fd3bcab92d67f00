//! Types for the media host module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::credentials::Credential;
use crate::records::Visibility;

/// A rendered file to publish.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: PathBuf,
    pub title: String,
    pub description: String,
    pub visibility: Visibility,
    pub credential: Credential,
}

/// Identity of a published video on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub remote_id: String,
    pub remote_url: String,
}
