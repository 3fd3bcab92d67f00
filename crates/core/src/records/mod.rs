//! Persistent records for sources, renditions and publish jobs.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteRenditionStore;
pub use store::{JobFilter, RenditionStore, StoreError};
pub use types::{
    JobTransition, NewRendition, NewSource, PublishJob, PublishStatus, Rendition, Source,
    Visibility,
};
