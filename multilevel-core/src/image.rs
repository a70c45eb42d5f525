//! Image generation (level 2) and image "editing" (level 3).
//!
//! Editing does not touch the uploaded pixels: the upload is only held until
//! the call returns, and a fresh image is rendered from an embellished prompt.

use async_trait::async_trait;
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    ImagesConfig,
    error::{Error, Result},
    model::GeneratedImageRecord,
};

pub mod pollinations;
pub mod size;
pub mod store;

pub use pollinations::PollinationsProvider;
pub use size::ImageSize;
pub use store::{ImageOrigin, ImageStore};

/// Appended to every edit prompt.
pub const EDIT_PROMPT_SUFFIX: &str = ", high quality, detailed";

pub const DEFAULT_VARIATION_PROMPT: &str = "creative variation";

/// Requested quality. Accepted for API compatibility; the free provider has
/// no HD mode, so it does not change the outbound request. Any string is
/// accepted and values other than `hd` read as `standard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

impl From<String> for ImageQuality {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("hd") { Self::Hd } else { Self::Standard }
    }
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Hd => "hd",
        }
    }
}

/// Image file formats served from the images directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        name.rsplit_once('.').and_then(|(_, ext)| Self::from_extension(ext))
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// What to ask a provider for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub prompt: String,
    pub size: ImageSize,
    pub seed: Option<i64>,
}

impl RenderRequest {
    pub fn new(prompt: impl Into<String>, size: ImageSize) -> Self {
        Self { prompt: prompt.into(), size, seed: None }
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Downloaded image bytes and the URL they were rendered from.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub url: String,
    pub data: Vec<u8>,
}

/// A text-to-image backend.
#[async_trait]
pub trait ImageProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// One outbound call, no retries.
    async fn render(&self, request: &RenderRequest) -> Result<RenderedImage>;
}

/// Owns an uploaded temporary file and removes it when dropped.
#[derive(Debug)]
pub struct UploadGuard {
    path: Option<PathBuf>,
}

impl UploadGuard {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Removes the file through the async runtime and disarms the guard.
    pub async fn remove(mut self) {
        if let Some(path) = self.path.take() {
            log_removal(&path, tokio::fs::remove_file(&path).await);
        }
    }
}

impl Drop for UploadGuard {
    // Only reached when the owning future is dropped before `remove` ran.
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            log_removal(&path, std::fs::remove_file(&path));
        }
    }
}

fn log_removal(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(path = %path.display(), "removed uploaded file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove uploaded file"),
    }
}

/// Renders images through a provider and stores them locally.
#[derive(Debug, Clone)]
pub struct ImageClient {
    provider: Arc<dyn ImageProvider>,
    store: ImageStore,
}

impl ImageClient {
    pub fn new(provider: Arc<dyn ImageProvider>, store: ImageStore) -> Self {
        Self { provider, store }
    }

    pub fn from_config(config: &ImagesConfig) -> Self {
        Self::new(
            Arc::new(PollinationsProvider::new(config)),
            ImageStore::new(config.dir.clone()),
        )
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        size: &str,
        quality: ImageQuality,
    ) -> Result<GeneratedImageRecord> {
        let prompt = require_prompt(prompt)?;
        let size: ImageSize = size.parse()?;
        tracing::info!(%size, quality = quality.as_str(), provider = self.provider.name(), "generating image");

        self.render_and_store(ImageOrigin::Generated, RenderRequest::new(prompt, size)).await
    }

    /// "Edits" by regenerating from `prompt`; `upload` is removed on return.
    pub async fn edit_image(
        &self,
        upload: Option<PathBuf>,
        prompt: &str,
        size: &str,
    ) -> Result<GeneratedImageRecord> {
        let upload = UploadGuard::new(upload);
        let result = self.edit_from_prompt(prompt, size).await;
        upload.remove().await;
        result
    }

    async fn edit_from_prompt(&self, prompt: &str, size: &str) -> Result<GeneratedImageRecord> {
        let prompt = require_prompt(prompt)?;
        let size: ImageSize = size.parse()?;
        tracing::info!(%size, provider = self.provider.name(), "editing image");

        let request = RenderRequest::new(format!("{prompt}{EDIT_PROMPT_SUFFIX}"), size);
        self.render_and_store(ImageOrigin::Edited, request).await
    }

    /// Renders a 1024x1024 variation with a time-based seed; `upload` is removed on return.
    pub async fn create_variation(
        &self,
        upload: Option<PathBuf>,
        prompt: Option<&str>,
    ) -> Result<GeneratedImageRecord> {
        let upload = UploadGuard::new(upload);

        let prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_VARIATION_PROMPT);
        tracing::info!(provider = self.provider.name(), "creating image variation");

        let request = RenderRequest::new(prompt, ImageSize::SQUARE_1024)
            .with_seed(Utc::now().timestamp_millis());
        let result = self.render_and_store(ImageOrigin::Variation, request).await;
        upload.remove().await;
        result
    }

    async fn render_and_store(
        &self,
        origin: ImageOrigin,
        request: RenderRequest,
    ) -> Result<GeneratedImageRecord> {
        let rendered = self.provider.render(&request).await?;

        let (local_filename, local_path) = self
            .store
            .persist(origin, &rendered.data, Local::now().naive_local())
            .await?;

        Ok(GeneratedImageRecord {
            remote_url: rendered.url,
            local_filename,
            local_path,
        })
    }
}

fn require_prompt(prompt: &str) -> Result<&str> {
    if prompt.trim().is_empty() {
        return Err(Error::Validation("prompt must not be empty".to_string()));
    }
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub;
    use axum::{
        Router,
        extract::{Path, Query},
        http::StatusCode,
        routing::get,
    };
    use std::{
        collections::HashMap,
        sync::Mutex,
        time::Duration,
    };
    use tempfile::TempDir;

    type Hits = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

    const IMAGE_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4, 5];

    /// Pollinations stand-in answering every prompt with `status` and `body`.
    async fn stub_provider(status: StatusCode, body: &'static [u8]) -> (String, Hits) {
        let hits: Hits = Arc::new(Mutex::new(Vec::new()));
        let recorder = hits.clone();

        let router = Router::new().route(
            "/prompt/:prompt",
            get(move |Path(prompt): Path<String>, Query(params): Query<HashMap<String, String>>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push((prompt, params));
                    (status, body)
                }
            }),
        );

        let base = spawn_stub(router).await;
        (format!("{base}/prompt"), hits)
    }

    fn client(provider_url: String) -> (ImageClient, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = ImagesConfig {
            dir: dir.path().to_path_buf(),
            provider_url,
            ..ImagesConfig::default()
        };
        (ImageClient::from_config(&config), dir)
    }

    fn is_timestamped(name: &str, prefix: &str) -> bool {
        let Some(stamp) = name.strip_prefix(prefix).and_then(|n| n.strip_suffix(".png")) else {
            return false;
        };
        let bytes = stamp.as_bytes();
        bytes.len() == 15
            && bytes[8] == b'_'
            && bytes.iter().enumerate().all(|(i, b)| i == 8 || b.is_ascii_digit())
    }

    fn upload_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("upload_test.png");
        std::fs::write(&path, b"uploaded pixels").unwrap();
        path
    }

    #[tokio::test]
    async fn generate_stores_exactly_the_downloaded_bytes() {
        let (provider_url, hits) = stub_provider(StatusCode::OK, IMAGE_BYTES).await;
        let (client, dir) = client(provider_url.clone());

        let record = client.generate_image("cats", "512x512", ImageQuality::Standard).await.unwrap();

        let files = client.store().list().await.unwrap();
        assert_eq!(files, vec![record.local_filename.clone()]);
        assert!(is_timestamped(&record.local_filename, "generated_"), "{}", record.local_filename);
        assert_eq!(record.local_path, dir.path().join(&record.local_filename));
        assert_eq!(std::fs::read(&record.local_path).unwrap(), IMAGE_BYTES);
        assert_eq!(
            record.remote_url,
            format!("{provider_url}/cats?width=512&height=512&nologo=true&enhance=true")
        );

        let hits = hits.lock().unwrap();
        assert_eq!(hits.len(), 1);
        let (prompt, params) = &hits[0];
        assert_eq!(prompt, "cats");
        assert_eq!(params.get("width").map(String::as_str), Some("512"));
        assert_eq!(params.get("height").map(String::as_str), Some("512"));
        assert_eq!(params.get("nologo").map(String::as_str), Some("true"));
        assert_eq!(params.get("enhance").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn quality_does_not_change_the_request() {
        let (provider_url, hits) = stub_provider(StatusCode::OK, IMAGE_BYTES).await;
        let (client, _dir) = client(provider_url);

        let standard = client.generate_image("cats", "512x512", ImageQuality::Standard).await.unwrap();
        let hd = client.generate_image("cats", "512x512", ImageQuality::Hd).await.unwrap();

        assert_eq!(standard.remote_url, hd.remote_url);
        let hits = hits.lock().unwrap();
        assert_eq!(hits[0], hits[1]);
    }

    #[tokio::test]
    async fn malformed_size_fails_before_any_network_call() {
        let (provider_url, hits) = stub_provider(StatusCode::OK, IMAGE_BYTES).await;
        let (client, dir) = client(provider_url);
        let upload = upload_file(&dir);

        let err = client.generate_image("cats", "abc", ImageQuality::Standard).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = client.edit_image(Some(upload.clone()), "cats", "abc").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(hits.lock().unwrap().is_empty());
        assert!(!upload.exists());
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let (provider_url, hits) = stub_provider(StatusCode::OK, IMAGE_BYTES).await;
        let (client, _dir) = client(provider_url);

        let err = client.generate_image("  ", "512x512", ImageQuality::Standard).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(hits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_embellishes_prompt_and_removes_upload() {
        let (provider_url, hits) = stub_provider(StatusCode::OK, IMAGE_BYTES).await;
        let (client, dir) = client(provider_url);
        let upload = upload_file(&dir);

        let record = client.edit_image(Some(upload.clone()), "add a wizard hat", "256x256").await.unwrap();

        assert!(is_timestamped(&record.local_filename, "edited_"), "{}", record.local_filename);
        assert!(!upload.exists());
        assert_eq!(hits.lock().unwrap()[0].0, "add a wizard hat, high quality, detailed");
        assert!(record.remote_url.contains("add%20a%20wizard%20hat%2C%20high%20quality%2C%20detailed"));
    }

    #[tokio::test]
    async fn edit_removes_upload_when_provider_fails() {
        let (provider_url, _hits) = stub_provider(StatusCode::SERVICE_UNAVAILABLE, b"busy").await;
        let (client, dir) = client(provider_url);
        let upload = upload_file(&dir);

        let err = client.edit_image(Some(upload.clone()), "sunset", "512x512").await.unwrap_err();

        match err {
            Error::RemoteService { provider, status, message } => {
                assert_eq!(provider, "pollinations");
                assert_eq!(status, Some(503));
                assert!(message.contains("busy"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!upload.exists());
        assert!(client.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn variation_uses_default_prompt_square_size_and_seed() {
        let (provider_url, hits) = stub_provider(StatusCode::OK, IMAGE_BYTES).await;
        let (client, _dir) = client(provider_url);

        let record = client.create_variation(None, None).await.unwrap();

        assert!(is_timestamped(&record.local_filename, "variation_"), "{}", record.local_filename);
        let hits = hits.lock().unwrap();
        let (prompt, params) = &hits[0];
        assert_eq!(prompt, DEFAULT_VARIATION_PROMPT);
        assert_eq!(params.get("width").map(String::as_str), Some("1024"));
        assert_eq!(params.get("height").map(String::as_str), Some("1024"));
        assert!(params.get("seed").is_some_and(|s| s.parse::<i64>().is_ok()));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let router = Router::new().route(
            "/prompt/:prompt",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                IMAGE_BYTES
            }),
        );
        let base = spawn_stub(router).await;
        let dir = tempfile::tempdir().unwrap();
        let config = ImagesConfig {
            dir: dir.path().to_path_buf(),
            provider_url: format!("{base}/prompt"),
            ..ImagesConfig::default()
        };
        let provider = PollinationsProvider::new(&config).with_timeout(Duration::from_millis(200));
        let client = ImageClient::new(Arc::new(provider), ImageStore::new(dir.path()));

        let err = client.generate_image("cats", "64x64", ImageQuality::Standard).await.unwrap_err();

        match err {
            Error::RemoteService { message, .. } => assert_eq!(message, "request timed out"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn format_detection_from_filename() {
        assert_eq!(ImageFormat::from_filename("a.PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_filename("a.jpeg").map(|f| f.mime_type()), Some("image/jpeg"));
        assert_eq!(ImageFormat::from_filename("noext"), None);
        assert_eq!(ImageFormat::from_filename("a.txt"), None);
    }

    #[test]
    fn upload_guard_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        drop(UploadGuard::new(Some(dir.path().join("never-written.png"))));
        drop(UploadGuard::new(None));
    }

    #[tokio::test]
    async fn variation_removes_upload_on_return() {
        let (provider_url, _hits) = stub_provider(StatusCode::OK, IMAGE_BYTES).await;
        let (client, dir) = client(provider_url);
        let upload = upload_file(&dir);

        client.create_variation(Some(upload.clone()), Some("moonlight")).await.unwrap();

        assert!(!upload.exists());
    }

    #[tokio::test]
    async fn abandoned_edit_still_removes_upload() {
        let router = Router::new().route(
            "/prompt/:prompt",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                IMAGE_BYTES
            }),
        );
        let base = spawn_stub(router).await;
        let (client, dir) = client(format!("{base}/prompt"));
        let upload = upload_file(&dir);

        let edit = client.edit_image(Some(upload.clone()), "hat", "64x64");
        assert!(tokio::time::timeout(Duration::from_millis(100), edit).await.is_err());

        assert!(!upload.exists());
    }

    #[test]
    fn any_quality_string_is_accepted() {
        let parse = |raw: &str| serde_json::from_value::<ImageQuality>(serde_json::json!(raw)).unwrap();

        assert_eq!(parse("hd"), ImageQuality::Hd);
        assert_eq!(parse("HD"), ImageQuality::Hd);
        assert_eq!(parse("standard"), ImageQuality::Standard);
        assert_eq!(parse("ultra"), ImageQuality::Standard);
        assert_eq!(serde_json::to_value(ImageQuality::Hd).unwrap(), "hd");
    }
}
