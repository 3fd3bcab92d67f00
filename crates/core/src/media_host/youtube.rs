//! YouTube Data API v3 media host.
//!
//! Uses the resumable upload protocol: one POST opens an upload session,
//! then the file is sent in fixed-size chunks with `Content-Range`. The
//! server answers 308 with a `Range` header until the last chunk lands.

use std::io::SeekFrom;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use super::error::MediaHostError;
use super::traits::MediaHost;
use super::types::{UploadReceipt, UploadRequest};
use crate::credentials::{Credential, ServiceKind};
use crate::metrics::{EXTERNAL_SERVICE_DURATION, EXTERNAL_SERVICE_REQUESTS};

/// Chunk sizes must be multiples of this.
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;

/// Consecutive 308 responses without progress tolerated before giving up.
const MAX_STALLED_CHUNKS: u32 = 3;

const SERVICE_NAME: &str = "YouTube";

static RANGE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^bytes=(\d+)-(\d+)$").unwrap());

/// YouTube host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    /// Base URL for upload endpoints.
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,
    /// Size of each PUT in bytes. Must be a positive multiple of 256 KiB.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
    /// Timeout for each HTTP request in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Category assigned to uploaded videos.
    #[serde(default = "default_category_id")]
    pub category_id: String,
}

fn default_upload_base_url() -> String {
    "https://www.googleapis.com/upload".to_string()
}

fn default_chunk_size() -> usize {
    8 * 1024 * 1024
}

fn default_timeout() -> u64 {
    300
}

fn default_category_id() -> String {
    "22".to_string() // People & Blogs
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            upload_base_url: default_upload_base_url(),
            chunk_size_bytes: default_chunk_size(),
            timeout_secs: default_timeout(),
            category_id: default_category_id(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

/// Outcome of one chunk PUT.
#[derive(Debug, PartialEq)]
enum ChunkOutcome {
    /// Server has persisted bytes up to (exclusive) this offset.
    Continue(u64),
    /// Upload complete.
    Done(String),
}

/// YouTube media host.
pub struct YouTubeHost {
    client: Client,
    config: YouTubeConfig,
}

impl YouTubeHost {
    /// Create a new YouTube host.
    pub fn new(config: YouTubeConfig) -> Result<Self, MediaHostError> {
        if config.chunk_size_bytes == 0 || config.chunk_size_bytes % UPLOAD_CHUNK_GRANULARITY != 0 {
            return Err(MediaHostError::InvalidRequest(format!(
                "chunk size {} is not a positive multiple of {}",
                config.chunk_size_bytes, UPLOAD_CHUNK_GRANULARITY
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Public watch URL of a video id.
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }

    fn session_url(&self) -> String {
        format!(
            "{}/youtube/v3/videos?uploadType=resumable&part=snippet,status",
            self.config.upload_base_url.trim_end_matches('/')
        )
    }

    fn video_metadata(&self, request: &UploadRequest) -> serde_json::Value {
        json!({
            "snippet": {
                "title": request.title,
                "description": request.description,
                "categoryId": self.config.category_id,
            },
            "status": {
                "privacyStatus": request.visibility.as_str(),
                "selfDeclaredMadeForKids": false,
            }
        })
    }

    async fn api_error(response: reqwest::Response) -> MediaHostError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        MediaHostError::Api {
            service: SERVICE_NAME,
            status,
            message,
        }
    }

    /// Exchanges the refresh token for a new access token.
    async fn refresh_access_token(
        &self,
        credential: &Credential,
    ) -> Result<Credential, MediaHostError> {
        let (client_id, client_secret) = match (&credential.client_id, &credential.client_secret) {
            (Some(id), Some(secret)) => (id.as_str(), secret.as_str()),
            _ => {
                return Err(MediaHostError::Auth(
                    "access token expired and no OAuth client is configured".to_string(),
                ))
            }
        };

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", credential.refresh_token.as_str()),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let response = self
            .client
            .post(&credential.token_endpoint)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaHostError::Auth(format!(
                "token refresh failed: {} - {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MediaHostError::InvalidResponse(e.to_string()))?;

        info!("Refreshed YouTube access token");
        Ok(credential.with_access_token(token.access_token))
    }

    async fn open_session(
        &self,
        request: &UploadRequest,
        credential: &Credential,
        total_bytes: u64,
    ) -> Result<reqwest::Response, MediaHostError> {
        Ok(self
            .client
            .post(self.session_url())
            .bearer_auth(&credential.access_token)
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", total_bytes.to_string())
            .json(&self.video_metadata(request))
            .send()
            .await?)
    }

    /// Opens a resumable session, refreshing the access token once on 401.
    async fn start_session(
        &self,
        request: &UploadRequest,
        total_bytes: u64,
    ) -> Result<(String, Credential), MediaHostError> {
        let mut credential = request.credential.clone();
        let mut response = self.open_session(request, &credential, total_bytes).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("YouTube rejected access token, refreshing");
            credential = self.refresh_access_token(&credential).await?;
            response = self.open_session(request, &credential, total_bytes).await?;
        }

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                MediaHostError::InvalidResponse("upload session has no Location header".to_string())
            })?
            .to_string();

        Ok((location, credential))
    }

    async fn read_chunk(
        file: &mut File,
        offset: u64,
        len: usize,
    ) -> Result<Vec<u8>, MediaHostError> {
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn put_chunk(
        &self,
        session_url: &str,
        credential: &Credential,
        chunk: Vec<u8>,
        offset: u64,
        total_bytes: u64,
    ) -> Result<ChunkOutcome, MediaHostError> {
        let end = offset + chunk.len() as u64 - 1;
        let response = self
            .client
            .put(session_url)
            .bearer_auth(&credential.access_token)
            .header(header::CONTENT_RANGE, content_range(offset, end, total_bytes))
            .body(chunk)
            .send()
            .await?;

        match response.status().as_u16() {
            308 => {
                let persisted = response
                    .headers()
                    .get(header::RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_range_header)
                    .map(|last| last + 1)
                    .unwrap_or(0);
                Ok(ChunkOutcome::Continue(persisted))
            }
            200 | 201 => {
                let video: VideoResource = response
                    .json()
                    .await
                    .map_err(|e| MediaHostError::InvalidResponse(e.to_string()))?;
                Ok(ChunkOutcome::Done(video.id))
            }
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn upload_inner(&self, request: &UploadRequest) -> Result<UploadReceipt, MediaHostError> {
        let mut file = File::open(&request.file).await?;
        let total_bytes = file.metadata().await?.len();
        if total_bytes == 0 {
            return Err(MediaHostError::InvalidRequest(format!(
                "{} is empty",
                request.file.display()
            )));
        }

        let (session_url, credential) = self.start_session(request, total_bytes).await?;
        debug!(total_bytes, "Opened YouTube upload session");

        let chunk_size = self.config.chunk_size_bytes as u64;
        let mut offset = 0u64;
        let mut stalled = 0u32;

        loop {
            let len = chunk_size.min(total_bytes - offset) as usize;
            let chunk = Self::read_chunk(&mut file, offset, len).await?;

            match self
                .put_chunk(&session_url, &credential, chunk, offset, total_bytes)
                .await?
            {
                ChunkOutcome::Done(video_id) => {
                    return Ok(UploadReceipt {
                        remote_url: Self::watch_url(&video_id),
                        remote_id: video_id,
                    });
                }
                ChunkOutcome::Continue(persisted) => {
                    if persisted <= offset {
                        stalled += 1;
                        if stalled > MAX_STALLED_CHUNKS {
                            return Err(MediaHostError::InvalidResponse(format!(
                                "upload stalled at byte {}",
                                persisted
                            )));
                        }
                    } else {
                        stalled = 0;
                    }
                    if persisted >= total_bytes {
                        return Err(MediaHostError::InvalidResponse(
                            "server acknowledged every byte without returning a video".to_string(),
                        ));
                    }
                    debug!(persisted, total_bytes, "Uploaded chunk");
                    offset = persisted;
                }
            }
        }
    }
}

/// Builds a `Content-Range` value for bytes `start..=end`.
fn content_range(start: u64, end: u64, total: u64) -> String {
    format!("bytes {}-{}/{}", start, end, total)
}

/// Last persisted byte index from a 308 `Range` header (`bytes=0-N`).
fn parse_range_header(value: &str) -> Option<u64> {
    let caps = RANGE_HEADER.captures(value.trim())?;
    caps.get(2)?.as_str().parse().ok()
}

#[async_trait]
impl MediaHost for YouTubeHost {
    fn kind(&self) -> ServiceKind {
        ServiceKind::YouTube
    }

    async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, MediaHostError> {
        let start = Instant::now();
        let result = self.upload_inner(&request).await;

        EXTERNAL_SERVICE_DURATION
            .with_label_values(&["youtube", "upload"])
            .observe(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "success" } else { "error" };
        EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["youtube", "upload", status])
            .inc();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Visibility;
    use std::path::{Path, PathBuf};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SESSION_PATH: &str = "/upload-session/abc";
    const VIDEO_LEN: usize = 600 * 1024;

    fn request() -> UploadRequest {
        UploadRequest {
            file: PathBuf::from("/data/renditions/u1/r1.mp4"),
            title: "clip.mov (square)".to_string(),
            description: String::new(),
            visibility: Visibility::Unlisted,
            credential: Credential::new(ServiceKind::YouTube, "a", "r"),
        }
    }

    #[test]
    fn test_parse_range_header() {
        assert_eq!(parse_range_header("bytes=0-262143"), Some(262_143));
        assert_eq!(parse_range_header(" bytes=0-0 "), Some(0));
        assert_eq!(parse_range_header("bytes 0-10/20"), None);
        assert_eq!(parse_range_header("garbage"), None);
    }

    #[test]
    fn test_content_range() {
        assert_eq!(content_range(0, 262_143, 1_000_000), "bytes 0-262143/1000000");
    }

    #[test]
    fn test_session_url() {
        let host = YouTubeHost::new(YouTubeConfig {
            upload_base_url: "http://localhost:9000/upload/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            host.session_url(),
            "http://localhost:9000/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status"
        );
    }

    #[test]
    fn test_video_metadata() {
        let host = YouTubeHost::new(YouTubeConfig::default()).unwrap();
        let metadata = host.video_metadata(&request());
        assert_eq!(metadata["snippet"]["title"], "clip.mov (square)");
        assert_eq!(metadata["snippet"]["categoryId"], "22");
        assert_eq!(metadata["status"]["privacyStatus"], "unlisted");
        assert_eq!(metadata["status"]["selfDeclaredMadeForKids"], false);
    }

    #[test]
    fn test_rejects_bad_chunk_size() {
        let result = YouTubeHost::new(YouTubeConfig {
            chunk_size_bytes: 1000,
            ..Default::default()
        });
        assert!(matches!(result, Err(MediaHostError::InvalidRequest(_))));
    }

    #[test]
    fn test_watch_url_and_error_format() {
        assert_eq!(
            YouTubeHost::watch_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        let err = MediaHostError::Api {
            service: SERVICE_NAME,
            status: 403,
            message: "quotaExceeded".to_string(),
        };
        assert_eq!(err.to_string(), "YouTube API error: 403 - quotaExceeded");
    }

    #[tokio::test]
    async fn test_refresh_without_client_fails() {
        let host = YouTubeHost::new(YouTubeConfig::default()).unwrap();
        let credential = Credential::new(ServiceKind::YouTube, "a", "r");
        let err = host.refresh_access_token(&credential).await.unwrap_err();
        assert!(matches!(err, MediaHostError::Auth(_)));
    }

    fn mock_host(server: &MockServer) -> YouTubeHost {
        YouTubeHost::new(YouTubeConfig {
            upload_base_url: server.uri(),
            chunk_size_bytes: UPLOAD_CHUNK_GRANULARITY,
            timeout_secs: 10,
            ..Default::default()
        })
        .unwrap()
    }

    fn write_video(dir: &Path, len: usize) -> PathBuf {
        let file = dir.join("rendition.mp4");
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        std::fs::write(&file, bytes).unwrap();
        file
    }

    fn upload_of(file: PathBuf, credential: Credential) -> UploadRequest {
        UploadRequest {
            file,
            credential,
            ..request()
        }
    }

    async fn mount_session(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/youtube/v3/videos"))
            .and(query_param("uploadType", "resumable"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}{}", server.uri(), SESSION_PATH)),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_chunk(server: &MockServer, content_range: &str, response: ResponseTemplate) {
        Mock::given(method("PUT"))
            .and(path(SESSION_PATH))
            .and(header("Content-Range", content_range))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    fn persisted_through(last_byte: u64) -> ResponseTemplate {
        ResponseTemplate::new(308).insert_header("Range", format!("bytes=0-{}", last_byte))
    }

    fn video_created(id: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": id }))
    }

    async fn put_body_lengths(server: &MockServer) -> Vec<usize> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == "PUT")
            .map(|r| r.body.len())
            .collect()
    }

    #[tokio::test]
    async fn test_upload_sends_file_in_chunks() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_video(dir.path(), VIDEO_LEN);

        mount_session(&server).await;
        mount_chunk(&server, "bytes 0-262143/614400", persisted_through(262_143)).await;
        mount_chunk(&server, "bytes 262144-524287/614400", persisted_through(524_287)).await;
        mount_chunk(&server, "bytes 524288-614399/614400", video_created("vid-1")).await;

        let host = mock_host(&server);
        let credential = Credential::new(ServiceKind::YouTube, "access", "refresh");
        let receipt = host.upload(upload_of(file, credential)).await.unwrap();

        assert_eq!(receipt.remote_id, "vid-1");
        assert_eq!(receipt.remote_url, "https://www.youtube.com/watch?v=vid-1");
        assert_eq!(put_body_lengths(&server).await, vec![262_144, 262_144, 90_112]);
    }

    #[tokio::test]
    async fn test_upload_resumes_from_short_range() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_video(dir.path(), VIDEO_LEN);

        mount_session(&server).await;
        // Only the first 100 000 bytes of the first chunk were kept.
        mount_chunk(&server, "bytes 0-262143/614400", persisted_through(99_999)).await;
        mount_chunk(&server, "bytes 100000-362143/614400", persisted_through(362_143)).await;
        mount_chunk(&server, "bytes 362144-614399/614400", video_created("vid-2")).await;

        let host = mock_host(&server);
        let credential = Credential::new(ServiceKind::YouTube, "access", "refresh");
        let receipt = host.upload(upload_of(file, credential)).await.unwrap();

        assert_eq!(receipt.remote_id, "vid-2");
        assert_eq!(put_body_lengths(&server).await, vec![262_144, 262_144, 252_256]);
    }

    #[tokio::test]
    async fn test_upload_refreshes_expired_token_once() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_video(dir.path(), 1000);

        Mock::given(method("POST"))
            .and(path("/youtube/v3/videos"))
            .and(header("Authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtube/v3/videos"))
            .and(header("Authorization", "Bearer fresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}{}", server.uri(), SESSION_PATH)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(SESSION_PATH))
            .and(header("Authorization", "Bearer fresh"))
            .and(header("Content-Range", "bytes 0-999/1000"))
            .respond_with(video_created("vid-3"))
            .expect(1)
            .mount(&server)
            .await;

        let mut credential = Credential::new(ServiceKind::YouTube, "stale", "refresh-1")
            .with_client("client-id", "client-secret");
        credential.token_endpoint = format!("{}/token", server.uri());

        let host = mock_host(&server);
        let receipt = host.upload(upload_of(file, credential)).await.unwrap();
        assert_eq!(receipt.remote_id, "vid-3");
    }

    #[tokio::test]
    async fn test_upload_error_carries_status_and_body() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_video(dir.path(), VIDEO_LEN);
        let body = r#"{"error":{"code":403,"message":"quotaExceeded"}}"#;

        mount_session(&server).await;
        mount_chunk(
            &server,
            "bytes 0-262143/614400",
            ResponseTemplate::new(403).set_body_string(body),
        )
        .await;

        let host = mock_host(&server);
        let credential = Credential::new(ServiceKind::YouTube, "access", "refresh");
        let err = host.upload(upload_of(file, credential)).await.unwrap_err();

        assert!(matches!(err, MediaHostError::Api { status: 403, .. }));
        assert_eq!(err.to_string(), format!("YouTube API error: 403 - {}", body));
    }

    #[tokio::test]
    async fn test_upload_gives_up_when_no_progress() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = write_video(dir.path(), VIDEO_LEN);

        mount_session(&server).await;
        Mock::given(method("PUT"))
            .and(path(SESSION_PATH))
            .respond_with(ResponseTemplate::new(308))
            .expect(u64::from(MAX_STALLED_CHUNKS) + 1)
            .mount(&server)
            .await;

        let host = mock_host(&server);
        let credential = Credential::new(ServiceKind::YouTube, "access", "refresh");
        let err = host.upload(upload_of(file, credential)).await.unwrap_err();

        assert!(matches!(err, MediaHostError::InvalidResponse(ref m) if m.contains("stalled")));
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let host = YouTubeHost::new(YouTubeConfig::default()).unwrap();
        let err = host.upload(request()).await.unwrap_err();
        assert!(matches!(err, MediaHostError::File(_)));
    }
}
