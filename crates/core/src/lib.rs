pub mod config;
pub mod credentials;
pub mod media;
pub mod media_host;
pub mod metrics;
pub mod pipeline;
pub mod publisher;
pub mod records;
pub mod storage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use credentials::{
    Credential, CredentialError, CredentialProvider, ServiceKind, SqliteCredentialStore,
    TokenBundle, TokenCipher,
};
pub use media::{FfmpegToolkit, MediaConfig, MediaError, MediaMetrics, MediaToolkit, Orientation};
pub use media_host::{MediaHost, MediaHostError, YouTubeConfig, YouTubeHost};
pub use pipeline::{Manifest, ManifestEntry, PipelineError, PipelineRequest, RenditionPipeline};
pub use publisher::{PublishError, Publisher};
pub use records::{
    PublishJob, PublishStatus, Rendition, RenditionStore, Source, SqliteRenditionStore,
    StoreError, Visibility,
};
pub use storage::{StorageConfig, StorageLayout};
