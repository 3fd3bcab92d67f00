//! Types for the media module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::MediaError;

/// A step of the per-orientation transform chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Probe,
    Scrub,
    Synthesize,
    Uniquify,
    /// Frame grab, not part of the chain.
    Thumbnail,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Probe => "probe",
            Stage::Scrub => "scrub",
            Stage::Synthesize => "synthesize",
            Stage::Uniquify => "uniquify",
            Stage::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aspect-ratio class of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// 1:1
    Square,
    /// 9:16
    Portrait,
    /// 16:9
    Landscape,
}

impl Orientation {
    /// Canonical order used when every orientation is requested.
    pub const ALL: [Orientation; 3] = [
        Orientation::Square,
        Orientation::Portrait,
        Orientation::Landscape,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Square => "square",
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "square" => Ok(Orientation::Square),
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            _ => Err(MediaError::UnsupportedOrientation(s.to_string())),
        }
    }
}

/// Measured properties of a video file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaMetrics {
    /// Total duration in seconds.
    pub duration_secs: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: f64,
}

impl MediaMetrics {
    /// Returns the orientation class matching this video's own aspect ratio.
    pub fn native_orientation(&self) -> Orientation {
        super::orientation::detect_native(self.width, self.height)
    }

    /// Same duration and frame rate, new frame size.
    pub fn with_dimensions(&self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..*self
        }
    }
}

/// Perturbation parameters applied by the uniquify stage.
///
/// Values are the deltas that were drawn, not the resulting absolutes, so the
/// exact transform can be audited and reproduced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformProfile {
    /// Seconds added to the total duration, in [-0.1, 0.1].
    pub duration_delta_secs: f64,
    /// Relative frame-rate change, in [-0.01, 0.01].
    pub fps_delta_ratio: f64,
    /// Relative bitrate change, in [-0.01, 0.01].
    pub bitrate_delta_ratio: f64,
}

/// Output of the orientation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedMedia {
    pub path: PathBuf,
    pub metrics: MediaMetrics,
}

/// Output of the uniquify stage.
#[derive(Debug, Clone, PartialEq)]
pub struct UniquifiedMedia {
    pub path: PathBuf,
    pub metrics: MediaMetrics,
    pub profile: TransformProfile,
}
