//! Pollinations free text-to-image provider.
//!
//! The prompt is the last path segment and the image bytes come back directly
//! in the response body; no API key is involved.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::{
    ImagesConfig,
    error::{Error, Result},
    image::{ImageProvider, RenderRequest, RenderedImage},
};

const PROVIDER: &str = "pollinations";

#[derive(Debug, Clone)]
pub struct PollinationsProvider {
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl PollinationsProvider {
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            base_url: config.provider_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            http: Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Public URL that renders `request`; also what callers get back as `remoteUrl`.
    pub fn image_url(&self, request: &RenderRequest) -> String {
        let mut url = format!(
            "{}/{}?width={}&height={}&nologo=true&enhance=true",
            self.base_url,
            urlencoding::encode(&request.prompt),
            request.size.width,
            request.size.height,
        );

        if let Some(seed) = request.seed {
            url.push_str(&format!("&seed={seed}"));
        }

        url
    }
}

#[async_trait]
impl ImageProvider for PollinationsProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderedImage> {
        let url = self.image_url(request);
        tracing::debug!(%url, "requesting image from Pollinations");

        let res = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::transport(PROVIDER, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::warn!(%status, "Pollinations returned an error");
            return Err(Error::RemoteService {
                provider: PROVIDER,
                status: Some(status.as_u16()),
                message: format!("image generation failed with status {status}: {}", truncate_body(&body)),
            });
        }

        let data = res.bytes().await.map_err(|e| Error::transport(PROVIDER, e))?;

        Ok(RenderedImage { url, data: data.to_vec() })
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageSize;

    fn provider() -> PollinationsProvider {
        PollinationsProvider::new(&ImagesConfig::default())
    }

    #[test]
    fn url_encodes_prompt_and_dimensions() {
        let request = RenderRequest::new("un gato astronauta", ImageSize { width: 512, height: 768 });

        assert_eq!(
            provider().image_url(&request),
            "https://image.pollinations.ai/prompt/un%20gato%20astronauta?width=512&height=768&nologo=true&enhance=true"
        );
    }

    #[test]
    fn url_escapes_path_separators_and_appends_seed() {
        let request = RenderRequest::new("cats/dogs & more", ImageSize::default()).with_seed(42);

        assert_eq!(
            provider().image_url(&request),
            "https://image.pollinations.ai/prompt/cats%2Fdogs%20%26%20more?width=1024&height=1024&nologo=true&enhance=true&seed=42"
        );
    }

    #[test]
    fn truncates_long_bodies_on_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);

        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
