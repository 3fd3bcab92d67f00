//! Configuration for the rendition pipeline.

use serde::{Deserialize, Serialize};

use crate::records::Visibility;

/// Rendition pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Orientation chains run at once within one upload. 1 = sequential.
    #[serde(default = "default_max_parallel")]
    pub max_parallel_orientations: usize,

    /// Visibility of newly published renditions.
    #[serde(default)]
    pub visibility: Visibility,
}

fn default_max_parallel() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_parallel_orientations: default_max_parallel(),
            visibility: Visibility::default(),
        }
    }
}

impl PipelineConfig {
    /// Sets the number of orientation chains run concurrently.
    pub fn with_parallelism(mut self, max_parallel_orientations: usize) -> Self {
        self.max_parallel_orientations = max_parallel_orientations;
        self
    }
}
