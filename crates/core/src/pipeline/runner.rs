//! Rendition pipeline runner.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::scratch::ScratchFiles;
use super::types::{Manifest, ManifestEntry, PipelineRequest};
use crate::credentials::{Credential, CredentialProvider};
use crate::media::{MediaError, MediaToolkit, Orientation};
use crate::metrics::{PIPELINE_RUNS, RENDITIONS_TOTAL};
use crate::publisher::Publisher;
use crate::records::{NewRendition, NewSource, Rendition, RenditionStore, Source};
use crate::storage::{sha256_file, StorageLayout};

/// One item of the orientation work list.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedOrientation {
    Render(Orientation),
    /// A requested label that names no orientation.
    Rejected { label: String, reason: String },
}

/// Builds the work list: the native orientation first, then (when
/// `generate_all`) every requested orientation, or all three when none were
/// requested. Duplicates are dropped; unknown labels are kept as rejections.
pub fn plan_orientations(
    native: Orientation,
    requested: &[String],
    generate_all: bool,
) -> Vec<PlannedOrientation> {
    let mut plan = vec![PlannedOrientation::Render(native)];
    if !generate_all {
        return plan;
    }

    let requested: Vec<&str> = requested
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if requested.is_empty() {
        plan.extend(
            Orientation::ALL
                .into_iter()
                .filter(|o| *o != native)
                .map(PlannedOrientation::Render),
        );
        return plan;
    }

    for label in requested {
        let item = match label.parse::<Orientation>() {
            Ok(orientation) => PlannedOrientation::Render(orientation),
            Err(e) => PlannedOrientation::Rejected {
                label: label.to_string(),
                reason: e.to_string(),
            },
        };
        if !plan.contains(&item) {
            plan.push(item);
        }
    }
    plan
}

/// Everything one orientation chain needs from its run.
struct RunContext<'a> {
    source: &'a Source,
    native: Orientation,
    credential: &'a Credential,
}

/// Turns one uploaded video into published renditions.
pub struct RenditionPipeline {
    toolkit: Arc<dyn MediaToolkit>,
    store: Arc<dyn RenditionStore>,
    credentials: Arc<dyn CredentialProvider>,
    publisher: Arc<Publisher>,
    layout: StorageLayout,
    config: PipelineConfig,
    rng: Mutex<StdRng>,
}

impl RenditionPipeline {
    pub fn new(
        toolkit: Arc<dyn MediaToolkit>,
        store: Arc<dyn RenditionStore>,
        credentials: Arc<dyn CredentialProvider>,
        publisher: Arc<Publisher>,
        layout: StorageLayout,
        config: PipelineConfig,
    ) -> Self {
        Self {
            toolkit,
            store,
            credentials,
            publisher,
            layout,
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Makes perturbations reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    /// Independent generator for one orientation chain.
    fn chain_rng(&self) -> StdRng {
        let mut parent = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        StdRng::seed_from_u64(parent.next_u64())
    }

    /// Runs the whole pipeline for one upload.
    ///
    /// Fails only when no orientation could succeed: missing credential,
    /// unreadable upload, or storage failure for the source. Per-orientation
    /// failures are reported in the manifest.
    pub async fn run(&self, request: PipelineRequest) -> Result<Manifest, PipelineError> {
        let result = self.run_inner(request).await;
        let outcome = if result.is_ok() { "completed" } else { "aborted" };
        PIPELINE_RUNS.with_label_values(&[outcome]).inc();
        result
    }

    async fn run_inner(&self, request: PipelineRequest) -> Result<Manifest, PipelineError> {
        let filename = request.original_filename.trim();
        if filename.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "original filename is empty".to_string(),
            ));
        }

        let kind = self.publisher.service_kind();
        let credential = self
            .credentials
            .get_credential(&request.user_id, kind)
            .await
            .map_err(|e| PipelineError::CredentialMissing {
                kind,
                reason: e.to_string(),
            })?;

        let metrics = self.toolkit.probe(&request.source_file).await?;

        let source_id = uuid::Uuid::new_v4().to_string();
        let storage_path = self
            .layout
            .source_path(&request.user_id, &source_id, filename);
        self.layout.ensure_user_dirs(&request.user_id).await?;
        tokio::fs::copy(&request.source_file, &storage_path).await?;

        let source = match self.store.create_source(NewSource {
            id: source_id,
            user_id: request.user_id.clone(),
            original_filename: filename.to_string(),
            storage_path: storage_path.clone(),
            metrics,
        }) {
            Ok(source) => source,
            Err(e) => {
                let _ = tokio::fs::remove_file(&storage_path).await;
                return Err(e.into());
            }
        };

        let native = metrics.native_orientation();
        let plan = plan_orientations(native, &request.orientations, request.generate_all);
        info!(
            source_id = %source.id,
            user_id = %source.user_id,
            native = %native,
            orientations = plan.len(),
            "Starting rendition run"
        );

        let ctx = RunContext {
            source: &source,
            native,
            credential: &credential,
        };
        let limiter = Semaphore::new(self.config.max_parallel_orientations.max(1));
        let chains = plan.into_iter().map(|planned| {
            let limiter = &limiter;
            let ctx = &ctx;
            async move {
                let _permit = limiter.acquire().await.ok();
                self.process_planned(ctx, planned).await
            }
        });
        // join_all keeps plan order in the manifest.
        let entries: Vec<ManifestEntry> = join_all(chains).await;

        let manifest = Manifest {
            source_id: source.id.clone(),
            original_filename: source.original_filename.clone(),
            entries,
        };
        info!(
            source_id = %source.id,
            succeeded = manifest.succeeded(),
            failed = manifest.failed(),
            "Rendition run finished"
        );
        Ok(manifest)
    }

    async fn process_planned(
        &self,
        ctx: &RunContext<'_>,
        planned: PlannedOrientation,
    ) -> ManifestEntry {
        match planned {
            PlannedOrientation::Render(orientation) => {
                let rng = self.chain_rng();
                self.process_orientation(ctx, orientation, rng).await
            }
            PlannedOrientation::Rejected { label, reason } => {
                warn!(source_id = %ctx.source.id, label = %label, "Rejected orientation label");
                ManifestEntry::failed(label, None, None, reason)
            }
        }
    }

    /// Renders, persists and publishes one orientation. Never fails: every
    /// problem becomes an `error` entry.
    async fn process_orientation(
        &self,
        ctx: &RunContext<'_>,
        orientation: Orientation,
        mut rng: StdRng,
    ) -> ManifestEntry {
        let source = ctx.source;
        let rendition_id = uuid::Uuid::new_v4().to_string();
        let title = format!("{} ({})", source.original_filename, orientation);

        let rendition = match self
            .render(source, ctx.native, orientation, &rendition_id, &mut rng)
            .await
        {
            Ok(rendition) => rendition,
            Err(e) => {
                let error = describe(&e);
                warn!(
                    source_id = %source.id,
                    rendition_id = %rendition_id,
                    orientation = %orientation,
                    error = %error,
                    "Orientation chain failed"
                );
                RENDITIONS_TOTAL
                    .with_label_values(&[orientation.as_str(), "error"])
                    .inc();
                let job_id = match self.store.create_failed_job(
                    &rendition_id,
                    &source.user_id,
                    &title,
                    &error,
                ) {
                    Ok(job) => Some(job.id),
                    Err(store_err) => {
                        warn!(
                            rendition_id = %rendition_id,
                            error = %store_err,
                            "Could not record failed chain"
                        );
                        None
                    }
                };
                return ManifestEntry::failed(
                    orientation.as_str(),
                    Some(rendition_id),
                    job_id,
                    error,
                );
            }
        };
        RENDITIONS_TOTAL
            .with_label_values(&[orientation.as_str(), "success"])
            .inc();

        let job = match self.store.create_publish_job(
            &rendition.id,
            &source.user_id,
            &title,
            self.config.visibility,
        ) {
            Ok(job) => job,
            Err(e) => {
                warn!(rendition_id = %rendition.id, error = %e, "Could not queue publish job");
                return ManifestEntry::failed(
                    orientation.as_str(),
                    Some(rendition.id.clone()),
                    None,
                    e.to_string(),
                );
            }
        };

        match self.publisher.start(&job, &rendition, ctx.credential).await {
            Ok(finished) => ManifestEntry::from_job(&rendition, &finished),
            Err(e) => ManifestEntry::failed(
                orientation.as_str(),
                Some(rendition.id.clone()),
                Some(job.id),
                e.to_string(),
            ),
        }
    }

    /// Scrub, then synthesize (unless native), then uniquify, then persist.
    ///
    /// Scratch files are removed on every exit path; the final file is only
    /// kept once its rendition row exists.
    async fn render(
        &self,
        source: &Source,
        native: Orientation,
        orientation: Orientation,
        rendition_id: &str,
        rng: &mut StdRng,
    ) -> Result<Rendition, PipelineError> {
        let started = Instant::now();
        let user_id = &source.user_id;
        let mut scratch = ScratchFiles::new();

        let clean = scratch.track(self.layout.scrubbed_path(user_id, rendition_id));
        let final_path = scratch.track(self.layout.rendition_path(user_id, rendition_id));

        self.toolkit.scrub(&source.storage_path, &clean).await?;

        let (input, metrics) = if orientation == native {
            (clean, source.metrics())
        } else {
            let synth_path = scratch.track(self.layout.synthesized_path(user_id, rendition_id));
            let synthesized = self
                .toolkit
                .synthesize(&clean, &synth_path, orientation, &source.metrics())
                .await?;
            (synthesized.path, synthesized.metrics)
        };

        let unique = self
            .toolkit
            .uniquify(&input, &final_path, &metrics, rng)
            .await?;

        let content_sha256 = sha256_file(&unique.path).await?;

        let rendition = self
            .store
            .create_rendition(NewRendition {
                id: rendition_id.to_string(),
                source_id: source.id.clone(),
                orientation,
                transform_profile: Some(unique.profile),
                storage_path: unique.path.clone(),
                metrics: unique.metrics,
                content_sha256: Some(content_sha256),
            })?;
        scratch.keep(&unique.path);

        info!(
            source_id = %source.id,
            rendition_id = %rendition.id,
            orientation = %orientation,
            width = rendition.width,
            height = rendition.height,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Rendition ready"
        );
        Ok(rendition)
    }
}

/// Error text for a manifest entry, with the last ffmpeg stderr line when
/// present.
fn describe(e: &PipelineError) -> String {
    match e {
        PipelineError::Media(
            media @ MediaError::Transform {
                stderr: Some(stderr),
                ..
            },
        ) => format!("{}: {}", media, stderr.lines().last().unwrap_or_default()),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn rendered(plan: &[PlannedOrientation]) -> Vec<Orientation> {
        plan.iter()
            .filter_map(|p| match p {
                PlannedOrientation::Render(o) => Some(*o),
                PlannedOrientation::Rejected { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_native_only_without_generate_all() {
        let plan = plan_orientations(Orientation::Landscape, &labels(&["square"]), false);
        assert_eq!(plan, vec![PlannedOrientation::Render(Orientation::Landscape)]);
    }

    #[test]
    fn test_generate_all_without_list_adds_every_orientation() {
        let plan = plan_orientations(Orientation::Landscape, &[], true);
        assert_eq!(
            rendered(&plan),
            vec![
                Orientation::Landscape,
                Orientation::Square,
                Orientation::Portrait
            ]
        );
    }

    #[test]
    fn test_requested_list_is_deduplicated_native_first() {
        let plan = plan_orientations(
            Orientation::Portrait,
            &labels(&["square", "portrait", " Square ", "square"]),
            true,
        );
        assert_eq!(
            rendered(&plan),
            vec![Orientation::Portrait, Orientation::Square]
        );
    }

    #[test]
    fn test_unknown_labels_are_rejected_not_dropped() {
        let plan = plan_orientations(
            Orientation::Square,
            &labels(&["landscape", "diagonal", ""]),
            true,
        );
        assert_eq!(plan.len(), 3);
        assert!(matches!(
            &plan[2],
            PlannedOrientation::Rejected { label, .. } if label == "diagonal"
        ));
    }

    #[test]
    fn test_describe_appends_last_stderr_line() {
        let err = MediaError::transform(
            crate::media::Stage::Uniquify,
            "ffmpeg exited with code: Some(1)",
            Some("frame=1\nEncoder failed".to_string()),
        );
        assert_eq!(
            describe(&PipelineError::Media(err)),
            "uniquify failed: ffmpeg exited with code: Some(1): Encoder failed"
        );
    }
}
