//! Types for the rendition pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::records::{PublishJob, PublishStatus, Rendition};

/// One upload to turn into renditions.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub user_id: String,
    /// Incoming file. It is copied into storage; the caller owns it.
    pub source_file: PathBuf,
    pub original_filename: String,
    /// Requested orientation labels. Empty means all three.
    pub orientations: Vec<String>,
    /// When false only the native orientation is rendered.
    pub generate_all: bool,
}

/// Outcome of one orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Success,
    Error,
}

/// Per-orientation result of a run or of a retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Orientation label as requested.
    pub orientation: String,
    /// Absent only when the label itself was rejected.
    pub rendition_id: Option<String>,
    pub job_id: Option<String>,
    pub status: EntryStatus,
    pub remote_url: Option<String>,
    pub error_text: Option<String>,
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ManifestEntry {
    /// Entry for a persisted rendition and its authoritative job.
    pub fn from_job(rendition: &Rendition, job: &PublishJob) -> Self {
        let status = if job.status == PublishStatus::Success {
            EntryStatus::Success
        } else {
            EntryStatus::Error
        };
        Self {
            orientation: rendition.orientation.to_string(),
            rendition_id: Some(rendition.id.clone()),
            job_id: Some(job.id.clone()),
            status,
            remote_url: job.remote_url.clone(),
            error_text: match status {
                EntryStatus::Success => None,
                EntryStatus::Error => Some(
                    job.error_text
                        .clone()
                        .unwrap_or_else(|| format!("publish job is {}", job.status)),
                ),
            },
            duration_secs: Some(rendition.duration_secs),
            width: Some(rendition.width),
            height: Some(rendition.height),
        }
    }

    /// Entry for an orientation that produced no rendition.
    pub fn failed(
        orientation: impl Into<String>,
        rendition_id: Option<String>,
        job_id: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            orientation: orientation.into(),
            rendition_id,
            job_id,
            status: EntryStatus::Error,
            remote_url: None,
            error_text: Some(error.into()),
            duration_secs: None,
            width: None,
            height: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EntryStatus::Success
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub source_id: String,
    pub original_filename: String,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Entry for an orientation label.
    pub fn entry(&self, orientation: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.orientation == orientation)
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }
}
