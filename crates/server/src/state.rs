use std::sync::Arc;

use clipforge_core::{
    Config, Publisher, RenditionPipeline, SanitizedConfig, SqliteCredentialStore, StorageLayout,
};

/// Shared application state
pub struct AppState {
    config: Config,
    pipeline: Arc<RenditionPipeline>,
    credentials: Arc<SqliteCredentialStore>,
    layout: StorageLayout,
}

impl AppState {
    pub fn new(
        config: Config,
        pipeline: Arc<RenditionPipeline>,
        credentials: Arc<SqliteCredentialStore>,
        layout: StorageLayout,
    ) -> Self {
        Self {
            config,
            pipeline,
            credentials,
            layout,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn pipeline(&self) -> &RenditionPipeline {
        &self.pipeline
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        self.pipeline.publisher()
    }

    pub fn credentials(&self) -> &SqliteCredentialStore {
        &self.credentials
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }
}
