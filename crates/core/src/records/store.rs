//! Record storage trait and types.

use thiserror::Error;

use super::types::{
    JobTransition, NewRendition, NewSource, PublishJob, PublishStatus, Rendition, Source,
    Visibility,
};

/// Error type for record storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The publish job cannot take this transition from its current status.
    #[error("Cannot {transition} publish job {job_id}: current status is {from}")]
    InvalidTransition {
        job_id: String,
        from: PublishStatus,
        transition: &'static str,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Filter for querying publish jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Filter by owning user.
    pub user_id: Option<String>,
    /// Filter by status.
    pub status: Option<PublishStatus>,
    /// Filter by rendition.
    pub rendition_id: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl JobFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_status(mut self, status: PublishStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_rendition(mut self, rendition_id: impl Into<String>) -> Self {
        self.rendition_id = Some(rendition_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for source/rendition/publish job storage backends.
pub trait RenditionStore: Send + Sync {
    /// Persist a new source.
    fn create_source(&self, source: NewSource) -> Result<Source, StoreError>;

    /// Get a source by ID.
    fn get_source(&self, id: &str) -> Result<Option<Source>, StoreError>;

    /// Persist a new rendition.
    fn create_rendition(&self, rendition: NewRendition) -> Result<Rendition, StoreError>;

    /// Get a rendition by ID.
    fn get_rendition(&self, id: &str) -> Result<Option<Rendition>, StoreError>;

    /// List renditions of a source in creation order.
    fn list_renditions(&self, source_id: &str) -> Result<Vec<Rendition>, StoreError>;

    /// Create a publish job in `queued`.
    fn create_publish_job(
        &self,
        rendition_id: &str,
        user_id: &str,
        title: &str,
        visibility: Visibility,
    ) -> Result<PublishJob, StoreError>;

    /// Record an orientation chain that failed before its rendition existed.
    ///
    /// The job is created directly in `error` and references the rendition id
    /// that had been allocated for the chain; no rendition row exists for it.
    fn create_failed_job(
        &self,
        rendition_id: &str,
        user_id: &str,
        title: &str,
        error: &str,
    ) -> Result<PublishJob, StoreError>;

    /// Get a publish job by ID.
    fn get_publish_job(&self, id: &str) -> Result<Option<PublishJob>, StoreError>;

    /// The most recent job of a rendition, which is authoritative for its
    /// publication state.
    fn latest_job_for_rendition(
        &self,
        rendition_id: &str,
    ) -> Result<Option<PublishJob>, StoreError>;

    /// List publish jobs matching the filter, newest first.
    fn list_publish_jobs(&self, filter: &JobFilter) -> Result<Vec<PublishJob>, StoreError>;

    /// Apply a state machine transition and commit it.
    fn transition_job(&self, id: &str, transition: JobTransition) -> Result<PublishJob, StoreError>;
}
