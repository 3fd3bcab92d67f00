//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! over a real pipeline, real SQLite stores and the core test doubles for
//! ffmpeg and the media host.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use clipforge_core::{
    load_config_from_str,
    testing::{MockMediaHost, MockMediaToolkit},
    Publisher, RenditionPipeline, RenditionStore, ServiceKind, SqliteCredentialStore,
    SqliteRenditionStore, StorageLayout, TokenBundle, TokenCipher,
};
use clipforge_server::state::AppState;

/// Re-export fixtures for test convenience
pub use clipforge_core::testing::fixtures;

pub const USER: &str = "user-1";

const BOUNDARY: &str = "clipforge-test-boundary";

/// Test fixture for E2E testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock ffmpeg toolkit - script stage failures
    pub toolkit: MockMediaToolkit,
    /// Mock media host - script upload failures
    pub host: MockMediaHost,
    /// Credential vault shared with the router
    pub credentials: Arc<SqliteCredentialStore>,
    /// Temporary directory for database and storage
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// One part of a multipart body.
pub enum Part<'a> {
    File { filename: &'a str, data: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

impl TestFixture {
    /// Fixture whose user already has a YouTube credential.
    pub async fn new() -> Self {
        let fixture = Self::without_credentials().await;
        fixture
            .credentials
            .save_tokens(
                USER,
                ServiceKind::YouTube,
                TokenBundle::new("ya29.test-access", "1//test-refresh"),
                None,
            )
            .expect("Failed to save test credential");
        fixture
    }

    pub async fn without_credentials() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let storage_root = temp_dir.path().join("media");

        let config = load_config_from_str(&format!(
            r#"
[vault]
secret = "test-secret"

[database]
path = "{}"

[storage]
root = "{}"
"#,
            db_path.display(),
            storage_root.display()
        ))
        .expect("Failed to parse test config");

        let cipher = TokenCipher::from_secret(&config.vault.secret).expect("Failed to derive key");
        let credentials = Arc::new(
            SqliteCredentialStore::new(&db_path, cipher)
                .expect("Failed to create credential store"),
        );
        let store: Arc<dyn RenditionStore> = Arc::new(
            SqliteRenditionStore::new(&db_path).expect("Failed to create rendition store"),
        );

        let toolkit = MockMediaToolkit::new();
        let host = MockMediaHost::new();
        let publisher = Arc::new(Publisher::new(
            Arc::clone(&store),
            credentials.clone(),
            Arc::new(host.clone()),
        ));
        let layout = StorageLayout::new(storage_root);
        let pipeline = Arc::new(RenditionPipeline::new(
            Arc::new(toolkit.clone()),
            store,
            credentials.clone(),
            publisher,
            layout.clone(),
            config.pipeline.clone(),
        ));

        let state = Arc::new(AppState::new(
            config,
            pipeline,
            Arc::clone(&credentials),
            layout,
        ));
        let router = clipforge_server::api::create_router(state);

        Self {
            router,
            toolkit,
            host,
            credentials,
            temp_dir,
        }
    }

    /// Send a GET request as `USER`.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, Some(USER), None).await
    }

    /// Send a POST request with JSON body as `USER`.
    pub async fn post(&self, path: &str, body: Option<Value>) -> TestResponse {
        self.request("POST", path, Some(USER), body).await
    }

    /// Send a PUT request with JSON body as `USER`.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(USER), Some(body)).await
    }

    /// Send a DELETE request as `USER`.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, Some(USER), None).await
    }

    /// POST a multipart upload as `user`.
    pub async fn upload(&self, user: Option<&str>, parts: &[Part<'_>]) -> TestResponse {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File { filename, data } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                             Content-Type: video/mp4\r\n\r\n",
                            filename
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                            name, value
                        )
                        .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/uploads")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(user) = user {
            builder = builder.header("X-User-Id", user);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Send a request to the test router.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(user) = user {
            request_builder = request_builder.header("X-User-Id", user);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Files left in the incoming directory.
    pub fn incoming_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path().join("media").join("incoming"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
