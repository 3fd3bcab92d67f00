//! Rendition pipeline: one upload in, one manifest out.
//!
//! For each orientation in the work list the chain is
//! Scrub -> Synthesize (skipped for the native orientation) -> Uniquify,
//! followed by persisting the rendition, queueing a publish job and handing
//! it to the [`Publisher`](crate::publisher::Publisher). A failed chain only
//! affects its own manifest entry.

mod config;
mod error;
mod runner;
mod scratch;
mod types;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use runner::{plan_orientations, PlannedOrientation, RenditionPipeline};
pub use scratch::ScratchFiles;
pub use types::{EntryStatus, Manifest, ManifestEntry, PipelineRequest};
