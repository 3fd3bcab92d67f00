//! Shared harness for pipeline and publisher integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use clipforge_core::{
    pipeline::{PipelineConfig, PipelineRequest},
    records::{RenditionStore, SqliteRenditionStore},
    testing::{fixtures, MockMediaHost, MockMediaToolkit, StaticCredentialProvider},
    Publisher, RenditionPipeline, StorageLayout,
};

pub const USER: &str = "user-1";

/// Pipeline wired to mocks, with storage in a temp dir.
pub struct TestHarness {
    pub pipeline: RenditionPipeline,
    pub publisher: Arc<Publisher>,
    pub toolkit: MockMediaToolkit,
    pub host: MockMediaHost,
    pub credentials: StaticCredentialProvider,
    pub store: Arc<SqliteRenditionStore>,
    pub layout: StorageLayout,
    pub storage_dir: TempDir,
    pub incoming_dir: TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(PipelineConfig::default()).await
    }

    /// Harness whose perturbations are reproducible.
    pub async fn seeded(seed: u64) -> Self {
        let mut harness = Self::new().await;
        harness.pipeline = harness.pipeline.with_seed(seed);
        harness
    }

    pub async fn with_config(config: PipelineConfig) -> Self {
        let storage_dir = TempDir::new().expect("Failed to create storage dir");
        let incoming_dir = TempDir::new().expect("Failed to create incoming dir");
        let db_path = storage_dir.path().join("test.db");

        let store = Arc::new(
            SqliteRenditionStore::new(&db_path).expect("Failed to create rendition store"),
        );
        let toolkit = MockMediaToolkit::new();
        let host = MockMediaHost::new();
        let credentials =
            StaticCredentialProvider::with_credential(USER, fixtures::youtube_credential()).await;
        let layout = StorageLayout::new(storage_dir.path().join("media"));

        let publisher = Arc::new(Publisher::new(
            Arc::clone(&store) as Arc<dyn RenditionStore>,
            Arc::new(credentials.clone()),
            Arc::new(host.clone()),
        ));
        let pipeline = RenditionPipeline::new(
            Arc::new(toolkit.clone()),
            Arc::clone(&store) as Arc<dyn RenditionStore>,
            Arc::new(credentials.clone()),
            Arc::clone(&publisher),
            layout.clone(),
            config,
        );

        Self {
            pipeline,
            publisher,
            toolkit,
            host,
            credentials,
            store,
            layout,
            storage_dir,
            incoming_dir,
        }
    }

    pub async fn incoming_video(&self, name: &str) -> PathBuf {
        fixtures::write_video(self.incoming_dir.path(), name).await
    }

    /// Request for the native orientation only.
    pub async fn native_request(&self) -> PipelineRequest {
        PipelineRequest {
            user_id: USER.to_string(),
            source_file: self.incoming_video("clip.MOV").await,
            original_filename: "clip.MOV".to_string(),
            orientations: Vec::new(),
            generate_all: false,
        }
    }

    /// Request for every orientation in `labels` (all three when empty).
    pub async fn request_all(&self, labels: &[&str]) -> PipelineRequest {
        PipelineRequest {
            orientations: labels.iter().map(|s| s.to_string()).collect(),
            generate_all: true,
            ..self.native_request().await
        }
    }

    /// File names currently in the user's renditions directory.
    pub fn rendition_files(&self) -> Vec<String> {
        list_names(&self.layout.renditions_dir(USER))
    }

    pub fn source_files(&self) -> Vec<String> {
        list_names(&self.layout.sources_dir(USER))
    }
}

fn list_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
