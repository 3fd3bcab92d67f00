//! Trait definitions for the media module.

use async_trait::async_trait;
use rand::RngCore;
use std::path::{Path, PathBuf};

use super::error::MediaError;
use super::types::{MediaMetrics, Orientation, SynthesizedMedia, UniquifiedMedia};

/// The probe and transform stages of the rendition chain.
///
/// Every transform writes to the caller-chosen `output` path and must not
/// leave a partial file there when it fails.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Returns the name of this toolkit implementation.
    fn name(&self) -> &str;

    /// Measures duration, frame size and frame rate without touching the file.
    async fn probe(&self, path: &Path) -> Result<MediaMetrics, MediaError>;

    /// Re-muxes `input` into `output` with all container and stream metadata
    /// removed. Streams are copied, not re-encoded.
    async fn scrub(&self, input: &Path, output: &Path) -> Result<PathBuf, MediaError>;

    /// Scales and pads `input` to the aspect ratio of `orientation`.
    ///
    /// Duration and frame rate are carried over from `known`; only the frame
    /// size changes.
    async fn synthesize(
        &self,
        input: &Path,
        output: &Path,
        orientation: Orientation,
        known: &MediaMetrics,
    ) -> Result<SynthesizedMedia, MediaError>;

    /// Re-encodes `input` with a freshly drawn perturbation of duration,
    /// frame rate and bitrate so the output hashes differently.
    async fn uniquify(
        &self,
        input: &Path,
        output: &Path,
        known: &MediaMetrics,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<UniquifiedMedia, MediaError>;

    /// Grabs the first frame of `video` as an image.
    async fn extract_thumbnail(&self, video: &Path, output: &Path) -> Result<PathBuf, MediaError>;

    /// Validates that the toolkit is properly configured and ready.
    async fn validate(&self) -> Result<(), MediaError>;
}
