//! Publisher: the publish job state machine.
//!
//! ```text
//! queued --start--> processing --(upload ok)--> success
//!                   processing --(upload failed)--> error
//!                   error --retry--> processing
//! ```
//!
//! Every transition is committed before the next step, so a crash never
//! leaves a job silently `processing` with a retry pending; retries are
//! always explicit.

mod error;
mod service;

pub use error::PublishError;
pub use service::{JobSummary, Publisher};
