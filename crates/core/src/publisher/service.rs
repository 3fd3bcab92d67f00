//! Drives publish jobs through their state machine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use super::error::PublishError;
use crate::credentials::{Credential, CredentialProvider, ServiceKind};
use crate::media_host::{MediaHost, UploadRequest};
use crate::metrics::{PUBLISH_ATTEMPTS, PUBLISH_RETRIES};
use crate::pipeline::ManifestEntry;
use crate::records::{
    JobFilter, JobTransition, PublishJob, PublishStatus, Rendition, RenditionStore, StoreError,
};

/// A publish job with the rendition it refers to, if that rendition exists.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job: PublishJob,
    pub rendition: Option<Rendition>,
}

/// Publishes renditions to a media host and retries failed jobs.
///
/// Every transition of a given job happens under that job's lock, so two
/// retries of the same job never overlap.
pub struct Publisher {
    store: Arc<dyn RenditionStore>,
    credentials: Arc<dyn CredentialProvider>,
    host: Arc<dyn MediaHost>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn RenditionStore>,
        credentials: Arc<dyn CredentialProvider>,
        host: Arc<dyn MediaHost>,
    ) -> Self {
        Self {
            store,
            credentials,
            host,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Credential kind of the configured media host.
    pub fn service_kind(&self) -> ServiceKind {
        self.host.kind()
    }

    fn job_lock(&self, job_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn release_lock(&self, job_id: &str, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map and this caller hold it: nobody is waiting.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(job_id);
        }
    }

    /// Runs a queued job: `queued -> processing -> success | error`.
    ///
    /// Returns the job in its final state. A host failure is recorded on the
    /// job and is not an `Err`.
    pub async fn start(
        &self,
        job: &PublishJob,
        rendition: &Rendition,
        credential: &Credential,
    ) -> Result<PublishJob, PublishError> {
        let lock = self.job_lock(&job.id);
        let result = {
            let _guard = lock.lock().await;
            match self.store.transition_job(&job.id, JobTransition::Start) {
                Ok(processing) => self.attempt(processing, rendition, credential).await,
                Err(e) => Err(map_transition_error(e)),
            }
        };
        self.release_lock(&job.id, lock);
        result
    }

    /// Re-publishes a failed job without re-transforming its rendition.
    ///
    /// The job must belong to `user_id` and be in `error`.
    pub async fn retry(&self, user_id: &str, job_id: &str) -> Result<ManifestEntry, PublishError> {
        let lock = self.job_lock(job_id);
        let result = {
            let _guard = lock.lock().await;
            self.retry_locked(user_id, job_id).await
        };
        self.release_lock(job_id, lock);
        result
    }

    async fn retry_locked(
        &self,
        user_id: &str,
        job_id: &str,
    ) -> Result<ManifestEntry, PublishError> {
        let not_found = || PublishError::JobNotFound(job_id.to_string());

        let job = self
            .store
            .get_publish_job(job_id)?
            .filter(|job| job.user_id == user_id)
            .ok_or_else(not_found)?;
        let rendition = self
            .store
            .get_rendition(&job.rendition_id)?
            .ok_or_else(not_found)?;
        self.store
            .get_source(&rendition.source_id)?
            .filter(|source| source.user_id == user_id)
            .ok_or_else(not_found)?;

        if job.status != PublishStatus::Error {
            return Err(PublishError::InvalidState {
                job_id: job.id,
                status: job.status,
            });
        }

        let kind = self.service_kind();
        let credential = self
            .credentials
            .get_credential(user_id, kind)
            .await
            .map_err(|e| PublishError::CredentialMissing {
                kind,
                reason: e.to_string(),
            })?;

        PUBLISH_RETRIES.inc();
        info!(job_id = %job.id, rendition_id = %rendition.id, "Retrying publish job");

        let processing = self
            .store
            .transition_job(&job.id, JobTransition::Retry)
            .map_err(map_transition_error)?;
        let finished = self.attempt(processing, &rendition, &credential).await?;

        Ok(ManifestEntry::from_job(&rendition, &finished))
    }

    /// Uploads the rendition for a job already in `processing` and commits
    /// the outcome.
    async fn attempt(
        &self,
        job: PublishJob,
        rendition: &Rendition,
        credential: &Credential,
    ) -> Result<PublishJob, PublishError> {
        let request = UploadRequest {
            file: rendition.storage_path.clone(),
            title: job.title.clone(),
            description: String::new(),
            visibility: job.visibility,
            credential: credential.clone(),
        };

        let kind = self.service_kind();
        let transition = match self.host.upload(request).await {
            Ok(receipt) => {
                info!(
                    job_id = %job.id,
                    rendition_id = %rendition.id,
                    remote_id = %receipt.remote_id,
                    "Published rendition"
                );
                PUBLISH_ATTEMPTS
                    .with_label_values(&[kind.as_str(), "success"])
                    .inc();
                JobTransition::Succeed {
                    remote_id: receipt.remote_id,
                    remote_url: receipt.remote_url,
                }
            }
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    rendition_id = %rendition.id,
                    error = %e,
                    "Publish failed"
                );
                PUBLISH_ATTEMPTS
                    .with_label_values(&[kind.as_str(), "error"])
                    .inc();
                JobTransition::Fail {
                    error: e.to_string(),
                }
            }
        };

        self.store
            .transition_job(&job.id, transition)
            .map_err(map_transition_error)
    }

    /// Moves jobs left in `processing` by a previous process to `error` so
    /// they can be retried. Call once at startup, before any publishing.
    pub fn fail_interrupted_jobs(&self) -> Result<usize, PublishError> {
        let stale = self.store.list_publish_jobs(
            &JobFilter::new()
                .with_status(PublishStatus::Processing)
                .with_limit(i64::MAX),
        )?;

        for job in &stale {
            warn!(job_id = %job.id, "Publish job was interrupted, marking as failed");
            self.store
                .transition_job(
                    &job.id,
                    JobTransition::Fail {
                        error: "interrupted before the upload completed".to_string(),
                    },
                )
                .map_err(map_transition_error)?;
        }

        Ok(stale.len())
    }

    /// A user's publish jobs, newest first, with their renditions.
    pub fn list_jobs(&self, user_id: &str, limit: i64) -> Result<Vec<JobSummary>, PublishError> {
        let jobs = self
            .store
            .list_publish_jobs(&JobFilter::new().with_user(user_id).with_limit(limit))?;

        jobs.into_iter()
            .map(|job| {
                let rendition = self.store.get_rendition(&job.rendition_id)?;
                Ok(JobSummary { job, rendition })
            })
            .collect()
    }
}

fn map_transition_error(e: StoreError) -> PublishError {
    match e {
        StoreError::NotFound { id, .. } => PublishError::JobNotFound(id),
        StoreError::InvalidTransition { job_id, from, .. } => PublishError::InvalidState {
            job_id,
            status: from,
        },
        other => PublishError::Store(other),
    }
}
