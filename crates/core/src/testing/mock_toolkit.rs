//! Mock media toolkit for testing.

use async_trait::async_trait;
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::media::{
    target_dimensions, MediaError, MediaMetrics, MediaToolkit, Orientation, Stage,
    SynthesizedMedia, TransformProfile, UniquifiedMedia,
};

/// A recorded stage invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedStage {
    pub stage: Stage,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    /// Target orientation, known for synthesize and uniquify.
    pub orientation: Option<Orientation>,
    pub success: bool,
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    stage: Stage,
    orientation: Option<Orientation>,
}

/// Mock implementation of the MediaToolkit trait.
///
/// Stages write real (tiny) files so storage paths, hashing and scratch
/// cleanup behave as in production:
/// - scrub copies the input
/// - synthesize copies the input and reports `target_dimensions`
/// - uniquify appends the drawn profile to the input and reports the
///   perturbed metrics
///
/// A scripted failure writes a partial output first, the way a killed
/// ffmpeg would.
///
/// # Example
///
/// ```rust,ignore
/// use clipforge_core::testing::MockMediaToolkit;
///
/// let toolkit = MockMediaToolkit::new();
/// toolkit.set_probe_metrics(fixtures::landscape_metrics()).await;
/// toolkit.fail_on(Stage::Uniquify, Some(Orientation::Square)).await;
///
/// let manifest = pipeline.run(request).await?;
/// assert_eq!(toolkit.stage_count(Stage::Scrub).await, 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockMediaToolkit {
    calls: Arc<RwLock<Vec<RecordedStage>>>,
    probe_metrics: Arc<RwLock<Option<MediaMetrics>>>,
    failures: Arc<RwLock<Vec<ScriptedFailure>>>,
    stage_delay: Arc<RwLock<Duration>>,
}

impl Default for MockMediaToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMediaToolkit {
    /// Create a mock that probes every file as 1920x1080, 10s, 30fps.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            probe_metrics: Arc::new(RwLock::new(Some(super::fixtures::landscape_metrics()))),
            failures: Arc::new(RwLock::new(Vec::new())),
            stage_delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Metrics returned by `probe`. `None` makes probing fail as unreadable.
    pub async fn set_probe_metrics(&self, metrics: impl Into<Option<MediaMetrics>>) {
        *self.probe_metrics.write().await = metrics.into();
    }

    /// Make `stage` fail, for one target orientation or for every call.
    ///
    /// Scrub has no target orientation, so an orientation filter never
    /// matches it.
    pub async fn fail_on(&self, stage: Stage, orientation: Option<Orientation>) {
        self.failures
            .write()
            .await
            .push(ScriptedFailure { stage, orientation });
    }

    /// Remove all scripted failures.
    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Simulated time spent in each transform stage.
    pub async fn set_stage_delay(&self, delay: Duration) {
        *self.stage_delay.write().await = delay;
    }

    /// Get all recorded stage calls.
    pub async fn recorded_stages(&self) -> Vec<RecordedStage> {
        self.calls.read().await.clone()
    }

    /// Number of calls made to one stage.
    pub async fn stage_count(&self, stage: Stage) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.stage == stage)
            .count()
    }

    async fn should_fail(&self, stage: Stage, orientation: Option<Orientation>) -> bool {
        self.failures.read().await.iter().any(|f| {
            f.stage == stage
                && match f.orientation {
                    None => true,
                    Some(wanted) => orientation == Some(wanted),
                }
        })
    }

    async fn record(
        &self,
        stage: Stage,
        input: &Path,
        output: Option<&Path>,
        orientation: Option<Orientation>,
        success: bool,
    ) {
        self.calls.write().await.push(RecordedStage {
            stage,
            input: input.to_path_buf(),
            output: output.map(Path::to_path_buf),
            orientation,
            success,
        });
    }

    /// Shared body of the three writing stages.
    async fn transform(
        &self,
        stage: Stage,
        input: &Path,
        output: &Path,
        orientation: Option<Orientation>,
        trailer: &[u8],
    ) -> Result<(), MediaError> {
        let delay = *self.stage_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut bytes = match tokio::fs::read(input).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.record(stage, input, Some(output), orientation, false).await;
                return Err(MediaError::InputNotFound {
                    path: input.to_path_buf(),
                });
            }
            Err(e) => return Err(MediaError::Io(e)),
        };

        if self.should_fail(stage, orientation).await {
            tokio::fs::write(output, b"partial").await?;
            self.record(stage, input, Some(output), orientation, false).await;
            return Err(MediaError::transform(
                stage,
                "exit code 1",
                Some(format!("mock {} failure\nConversion failed!", stage)),
            ));
        }

        bytes.extend_from_slice(trailer);
        tokio::fs::write(output, bytes).await?;
        self.record(stage, input, Some(output), orientation, true).await;
        Ok(())
    }
}

#[async_trait]
impl MediaToolkit for MockMediaToolkit {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaMetrics, MediaError> {
        if !path.exists() {
            self.record(Stage::Probe, path, None, None, false).await;
            return Err(MediaError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let metrics = *self.probe_metrics.read().await;
        let fail = self.should_fail(Stage::Probe, None).await;
        match metrics {
            Some(metrics) if !fail => {
                self.record(Stage::Probe, path, None, None, true).await;
                Ok(metrics)
            }
            _ => {
                self.record(Stage::Probe, path, None, None, false).await;
                Err(MediaError::unreadable(path, "no video stream"))
            }
        }
    }

    async fn scrub(&self, input: &Path, output: &Path) -> Result<PathBuf, MediaError> {
        self.transform(Stage::Scrub, input, output, None, b"").await?;
        Ok(output.to_path_buf())
    }

    async fn synthesize(
        &self,
        input: &Path,
        output: &Path,
        orientation: Orientation,
        known: &MediaMetrics,
    ) -> Result<SynthesizedMedia, MediaError> {
        let (width, height) = target_dimensions(orientation, known.width, known.height);
        let trailer = format!("|{}x{}", width, height);
        self.transform(
            Stage::Synthesize,
            input,
            output,
            Some(orientation),
            trailer.as_bytes(),
        )
        .await?;

        Ok(SynthesizedMedia {
            path: output.to_path_buf(),
            metrics: known.with_dimensions(width, height),
        })
    }

    async fn uniquify(
        &self,
        input: &Path,
        output: &Path,
        known: &MediaMetrics,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<UniquifiedMedia, MediaError> {
        let profile = TransformProfile::draw(rng);
        let size_bytes = tokio::fs::metadata(input)
            .await
            .map(|m| m.len())
            .unwrap_or_default();
        let trailer = format!(
            "|{:.6}|{:.6}|{:.6}",
            profile.duration_delta_secs, profile.fps_delta_ratio, profile.bitrate_delta_ratio
        );
        self.transform(
            Stage::Uniquify,
            input,
            output,
            Some(known.native_orientation()),
            trailer.as_bytes(),
        )
        .await?;

        Ok(UniquifiedMedia {
            path: output.to_path_buf(),
            metrics: profile.resulting_metrics(known, size_bytes),
            profile,
        })
    }

    async fn extract_thumbnail(&self, video: &Path, output: &Path) -> Result<PathBuf, MediaError> {
        if !video.exists() {
            return Err(MediaError::InputNotFound {
                path: video.to_path_buf(),
            });
        }
        tokio::fs::write(output, b"jpeg").await?;
        Ok(output.to_path_buf())
    }

    async fn validate(&self) -> Result<(), MediaError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_probe_returns_configured_metrics() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let toolkit = MockMediaToolkit::new();
        let metrics = toolkit.probe(&input).await.unwrap();
        assert_eq!((metrics.width, metrics.height), (1920, 1080));

        toolkit.set_probe_metrics(None).await;
        let err = toolkit.probe(&input).await.unwrap_err();
        assert!(matches!(err, MediaError::UnreadableMedia { .. }));
    }

    #[tokio::test]
    async fn test_synthesize_reports_target_dimensions() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let toolkit = MockMediaToolkit::new();
        let known = super::super::fixtures::landscape_metrics();
        let synth = toolkit
            .synthesize(&input, &output, Orientation::Square, &known)
            .await
            .unwrap();
        assert_eq!((synth.metrics.width, synth.metrics.height), (1080, 1080));
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_scripted_failure_leaves_partial_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let toolkit = MockMediaToolkit::new();
        toolkit.fail_on(Stage::Uniquify, Some(Orientation::Square)).await;

        let square = MediaMetrics {
            duration_secs: 10.0,
            width: 1080,
            height: 1080,
            fps: 30.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let err = toolkit
            .uniquify(&input, &output, &square, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Transform { stage: Stage::Uniquify, .. }));
        assert!(output.exists());

        let landscape = super::super::fixtures::landscape_metrics();
        assert!(toolkit
            .uniquify(&input, &output, &landscape, &mut rng)
            .await
            .is_ok());
        assert_eq!(toolkit.stage_count(Stage::Uniquify).await, 2);
    }
}
