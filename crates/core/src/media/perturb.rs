//! Randomized micro-perturbations for the uniquify stage.

use rand::Rng;

use super::types::{MediaMetrics, TransformProfile};

/// Largest absolute change applied to the total duration, in seconds.
pub const MAX_DURATION_DELTA_SECS: f64 = 0.1;

/// Largest relative change applied to frame rate and bitrate.
pub const MAX_RATE_DELTA_RATIO: f64 = 0.01;

/// Absolute encoder targets derived from a profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbedTargets {
    pub duration_secs: f64,
    /// Time to add past the end of the input; zero when the clip shrinks.
    pub extend_secs: f64,
    pub fps: f64,
    pub bitrate_bps: u64,
}

impl TransformProfile {
    /// Draws three independent uniform deltas from `rng`.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            duration_delta_secs: rng
                .gen_range(-MAX_DURATION_DELTA_SECS..=MAX_DURATION_DELTA_SECS),
            fps_delta_ratio: rng.gen_range(-MAX_RATE_DELTA_RATIO..=MAX_RATE_DELTA_RATIO),
            bitrate_delta_ratio: rng.gen_range(-MAX_RATE_DELTA_RATIO..=MAX_RATE_DELTA_RATIO),
        }
    }

    /// Applies the deltas to measured metrics.
    ///
    /// The source bitrate is estimated from the container size, so it includes
    /// audio and muxing overhead.
    pub fn apply(&self, metrics: &MediaMetrics, file_size_bytes: u64) -> PerturbedTargets {
        let duration_secs = (metrics.duration_secs + self.duration_delta_secs).max(0.1);
        let fps = metrics.fps * (1.0 + self.fps_delta_ratio);
        let source_bitrate = if metrics.duration_secs > 0.0 {
            file_size_bytes as f64 * 8.0 / metrics.duration_secs
        } else {
            0.0
        };
        let bitrate_bps = (source_bitrate * (1.0 + self.bitrate_delta_ratio))
            .round()
            .max(1.0) as u64;

        PerturbedTargets {
            duration_secs,
            extend_secs: (duration_secs - metrics.duration_secs).max(0.0),
            fps,
            bitrate_bps,
        }
    }

    /// Metrics the encoder is asked to produce. A real encode can land
    /// slightly off these, so the output file is measured afterwards.
    pub fn resulting_metrics(&self, metrics: &MediaMetrics, file_size_bytes: u64) -> MediaMetrics {
        let targets = self.apply(metrics, file_size_bytes);
        MediaMetrics {
            duration_secs: targets.duration_secs,
            fps: targets.fps,
            ..*metrics
        }
    }
}
