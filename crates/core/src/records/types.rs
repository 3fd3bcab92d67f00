//! Source, rendition and publish job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::media::{MediaMetrics, Orientation, TransformProfile};

/// One originally uploaded file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub user_id: String,
    pub original_filename: String,
    pub storage_path: PathBuf,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub created_at: DateTime<Utc>,
}

impl Source {
    pub fn metrics(&self) -> MediaMetrics {
        MediaMetrics {
            duration_secs: self.duration_secs,
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }
}

/// Request to persist a source. The id is allocated by the caller because
/// the storage path is derived from it.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub id: String,
    pub user_id: String,
    pub original_filename: String,
    pub storage_path: PathBuf,
    pub metrics: MediaMetrics,
}

/// One derived variant of a source for one orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    pub id: String,
    pub source_id: String,
    pub orientation: Orientation,
    pub transform_profile: Option<TransformProfile>,
    pub storage_path: PathBuf,
    /// Metrics of the final stage output, not of the source.
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Hex SHA-256 of the rendered file.
    pub content_sha256: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rendition {
    pub fn metrics(&self) -> MediaMetrics {
        MediaMetrics {
            duration_secs: self.duration_secs,
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }
}

/// Request to persist a rendition.
#[derive(Debug, Clone)]
pub struct NewRendition {
    pub id: String,
    pub source_id: String,
    pub orientation: Orientation,
    pub transform_profile: Option<TransformProfile>,
    pub storage_path: PathBuf,
    pub metrics: MediaMetrics,
    pub content_sha256: Option<String>,
}

/// Visibility of a published video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Unlisted,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "unlisted" => Ok(Visibility::Unlisted),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

/// Publication state of a job.
///
/// ```text
/// queued --start--> processing --succeed--> success
///                        |  ^
///                   fail v  | retry
///                        error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Queued,
    Processing,
    Success,
    Error,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Queued => "queued",
            PublishStatus::Processing => "processing",
            PublishStatus::Success => "success",
            PublishStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishStatus::Success | PublishStatus::Error)
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(PublishStatus::Queued),
            "processing" => Ok(PublishStatus::Processing),
            "success" => Ok(PublishStatus::Success),
            "error" => Ok(PublishStatus::Error),
            other => Err(format!("unknown publish status: {}", other)),
        }
    }
}

/// An edge of the publish state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum JobTransition {
    /// queued -> processing
    Start,
    /// error -> processing
    Retry,
    /// processing -> success
    Succeed {
        remote_id: String,
        remote_url: String,
    },
    /// processing -> error
    Fail { error: String },
}

impl JobTransition {
    pub fn name(&self) -> &'static str {
        match self {
            JobTransition::Start => "start",
            JobTransition::Retry => "retry",
            JobTransition::Succeed { .. } => "succeed",
            JobTransition::Fail { .. } => "fail",
        }
    }

    /// Status reached when applying this transition from `from`, if allowed.
    pub fn target(&self, from: PublishStatus) -> Option<PublishStatus> {
        match (from, self) {
            (PublishStatus::Queued, JobTransition::Start) => Some(PublishStatus::Processing),
            (PublishStatus::Error, JobTransition::Retry) => Some(PublishStatus::Processing),
            (PublishStatus::Processing, JobTransition::Succeed { .. }) => {
                Some(PublishStatus::Success)
            }
            (PublishStatus::Processing, JobTransition::Fail { .. }) => Some(PublishStatus::Error),
            _ => None,
        }
    }
}

/// One attempt to publish a rendition to a media host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishJob {
    pub id: String,
    pub rendition_id: String,
    pub user_id: String,
    /// Set if and only if `status` is `Success`.
    pub remote_id: Option<String>,
    pub remote_url: Option<String>,
    pub title: String,
    pub visibility: Visibility,
    pub thumbnail_applied: bool,
    pub status: PublishStatus,
    pub error_text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
