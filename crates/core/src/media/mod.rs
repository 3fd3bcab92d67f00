//! Media module for probing and transforming videos.
//!
//! This module provides the `MediaToolkit` trait and an FFmpeg implementation
//! of the four rendition stages.
//!
//! # Stages
//!
//! - Probe: measure duration, frame size and frame rate
//! - Scrub: strip container and stream metadata with a stream copy
//! - Synthesize: scale and pad to a square, portrait or landscape frame
//! - Uniquify: re-encode with small random shifts to duration, fps and bitrate
//!
//! # Example
//!
//! ```ignore
//! use clipforge_core::media::{FfmpegToolkit, MediaToolkit, Orientation};
//!
//! let toolkit = FfmpegToolkit::with_defaults();
//! toolkit.validate().await?;
//!
//! let metrics = toolkit.probe(Path::new("/data/clip.mov")).await?;
//! let clean = toolkit.scrub(Path::new("/data/clip.mov"), Path::new("/tmp/a_clean.mp4")).await?;
//! let square = toolkit
//!     .synthesize(&clean, Path::new("/tmp/a_synth.mp4"), Orientation::Square, &metrics)
//!     .await?;
//! let mut rng = rand::thread_rng();
//! let unique = toolkit
//!     .uniquify(&square.path, Path::new("/out/a.mp4"), &square.metrics, &mut rng)
//!     .await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod orientation;
mod perturb;
mod traits;
mod types;

pub use config::MediaConfig;
pub use error::MediaError;
pub use ffmpeg::FfmpegToolkit;
pub use orientation::{detect_native, scale_pad_filter, target_dimensions};
pub use perturb::{PerturbedTargets, MAX_DURATION_DELTA_SECS, MAX_RATE_DELTA_RATIO};
pub use traits::MediaToolkit;
pub use types::{
    MediaMetrics, Orientation, Stage, SynthesizedMedia, TransformProfile, UniquifiedMedia,
};
