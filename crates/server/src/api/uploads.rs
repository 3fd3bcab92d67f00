//! Upload and publish job handlers.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;

use clipforge_core::{
    media::Orientation,
    pipeline::{ManifestEntry, PipelineRequest, ScratchFiles},
    publisher::JobSummary,
    Manifest, PublishStatus, Rendition, Visibility,
};

use super::error::{api_error, pipeline_error, publish_error, ApiError};
use super::middleware::UserId;
use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

/// Filename used when the multipart file part carries none.
const FALLBACK_FILENAME: &str = "upload.mp4";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing publish jobs
#[derive(Debug, Deserialize)]
pub struct ListUploadsParams {
    pub limit: Option<i64>,
}

/// Rendition fields shown next to a job
#[derive(Debug, Serialize)]
pub struct RenditionSummary {
    pub id: String,
    pub source_id: String,
    pub orientation: Orientation,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl From<Rendition> for RenditionSummary {
    fn from(rendition: Rendition) -> Self {
        Self {
            id: rendition.id,
            source_id: rendition.source_id,
            orientation: rendition.orientation,
            duration_secs: rendition.duration_secs,
            width: rendition.width,
            height: rendition.height,
            fps: rendition.fps,
        }
    }
}

/// Response for one publish job
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub rendition_id: String,
    pub status: PublishStatus,
    pub title: String,
    pub visibility: Visibility,
    pub remote_id: Option<String>,
    pub remote_url: Option<String>,
    pub error_text: Option<String>,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub rendition: Option<RenditionSummary>,
}

impl From<JobSummary> for JobResponse {
    fn from(summary: JobSummary) -> Self {
        let job = summary.job;
        Self {
            id: job.id,
            rendition_id: job.rendition_id,
            status: job.status,
            title: job.title,
            visibility: job.visibility,
            remote_id: job.remote_id,
            remote_url: job.remote_url,
            error_text: job.error_text,
            published_at: job.published_at.map(|t| t.to_rfc3339()),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            rendition: summary.rendition.map(RenditionSummary::from),
        }
    }
}

/// Response for listing publish jobs
#[derive(Debug, Serialize)]
pub struct ListUploadsResponse {
    pub jobs: Vec<JobResponse>,
    pub limit: i64,
}

/// Parsed multipart form of an upload
struct UploadForm {
    file: Option<(PathBuf, String)>,
    generate_all: bool,
    orientations: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Accept a video and run it through the rendition pipeline.
///
/// Multipart fields: `file` (required), `generate_orientations`
/// (`true`/`false`), `orientations` (comma-separated labels).
pub async fn create_upload(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    multipart: Multipart,
) -> Result<Json<Manifest>, ApiError> {
    let incoming_dir = state.layout().root().join("incoming");
    tokio::fs::create_dir_all(&incoming_dir).await.map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to prepare upload directory: {}", e),
        )
    })?;

    // The incoming copy is removed once the pipeline has stored its own.
    let mut scratch = ScratchFiles::new();
    let form = read_form(multipart, &incoming_dir, &mut scratch).await?;

    let (source_file, original_filename) = form
        .file
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing file field"))?;

    info!(
        user_id = %user_id,
        filename = %original_filename,
        generate_all = form.generate_all,
        "Received upload"
    );

    let manifest = state
        .pipeline()
        .run(PipelineRequest {
            user_id,
            source_file,
            original_filename,
            orientations: form.orientations,
            generate_all: form.generate_all,
        })
        .await
        .map_err(|e| pipeline_error(&e))?;

    Ok(Json(manifest))
}

/// List the caller's publish jobs, newest first
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Query(params): Query<ListUploadsParams>,
) -> Result<Json<ListUploadsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let jobs = state
        .publisher()
        .list_jobs(&user_id, limit)
        .map_err(|e| publish_error(&e))?;

    Ok(Json(ListUploadsResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        limit,
    }))
}

/// Retry a failed publish job
pub async fn retry_upload(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(job_id): Path<String>,
) -> Result<Json<ManifestEntry>, ApiError> {
    let entry = state
        .publisher()
        .retry(&user_id, &job_id)
        .await
        .map_err(|e| publish_error(&e))?;
    Ok(Json(entry))
}

// ============================================================================
// Helpers
// ============================================================================

async fn read_form(
    mut multipart: Multipart,
    incoming_dir: &std::path::Path,
    scratch: &mut ScratchFiles,
) -> Result<UploadForm, ApiError> {
    let bad_request = |e: axum::extract::multipart::MultipartError| {
        api_error(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {}", e))
    };

    let mut form = UploadForm {
        file: None,
        generate_all: false,
        orientations: Vec::new(),
    };

    while let Some(mut field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            // Only the first file part is used.
            "file" if form.file.is_none() => {
                let filename = field
                    .file_name()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(FALLBACK_FILENAME)
                    .to_string();
                let path = scratch.track(
                    incoming_dir.join(format!("{}.part", uuid::Uuid::new_v4())),
                );

                let io_error = |e: std::io::Error| {
                    api_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Failed to store upload: {}", e),
                    )
                };
                let mut file = tokio::fs::File::create(&path).await.map_err(io_error)?;
                while let Some(chunk) = field.chunk().await.map_err(bad_request)? {
                    file.write_all(&chunk).await.map_err(io_error)?;
                }
                file.flush().await.map_err(io_error)?;

                form.file = Some((path, filename));
            }
            "generate_orientations" => {
                let text = field.text().await.map_err(bad_request)?;
                form.generate_all = parse_flag(&text);
            }
            "orientations" => {
                let text = field.text().await.map_err(bad_request)?;
                form.orientations = text
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    Ok(form)
}

fn parse_flag(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("1"));
        assert!(parse_flag("on"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("nope"));
    }
}
