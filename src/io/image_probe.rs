//! Image type probe - classifies room photos as panoramic or flat
//!
//! The probe never fails. Any transport, status, decode, or timeout problem
//! is logged and reported as `ImageTypeResult::unloaded()`, which renders the
//! image on the flat plane.

use crate::domain::types::{ImageId, ImageTypeResult};
use crate::infra::metrics::Metrics;
use crate::io::api::ApiEndpoints;
use anyhow::Context;
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Resolves an image id to its panoramic/flat classification
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn probe(&self, id: &ImageId) -> ImageTypeResult;
}

/// Read pixel dimensions from the image header without decoding pixels
pub fn read_dimensions(bytes: &[u8]) -> anyhow::Result<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to sniff image format")?;
    let dims = reader.into_dimensions().context("failed to read image header")?;
    Ok(dims)
}

/// Probe backed by the image store over HTTP
pub struct HttpImageProbe {
    client: reqwest::Client,
    api: ApiEndpoints,
    timeout: Option<Duration>,
    panorama_ratio: f64,
    metrics: Arc<Metrics>,
}

impl HttpImageProbe {
    pub fn new(
        api: ApiEndpoints,
        timeout: Option<Duration>,
        panorama_ratio: f64,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        // One client for the whole tour (connection pooling)
        let client = reqwest::Client::builder()
            .http1_only()
            .build()
            .context("failed to build image store client")?;
        Ok(Self { client, api, timeout, panorama_ratio, metrics })
    }

    async fn fetch(&self, id: &ImageId) -> anyhow::Result<ImageTypeResult> {
        let url = self.api.image_url(id);
        let mut request = self.client.get(&url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("image store returned {status}");
        }

        let body = response.bytes().await.context("failed to read image body")?;
        let (width, height) = read_dimensions(&body)?;
        Ok(ImageTypeResult::with_ratio(width, height, self.panorama_ratio))
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn probe(&self, id: &ImageId) -> ImageTypeResult {
        let start = Instant::now();
        let result = self.fetch(id).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(result) => {
                self.metrics.record_probe(latency_ms, false);
                debug!(
                    image_id = %id,
                    width = result.width,
                    height = result.height,
                    panoramic = result.is_panoramic,
                    latency_ms = latency_ms,
                    "image_probed"
                );
                result
            }
            Err(e) => {
                self.metrics.record_probe(latency_ms, true);
                warn!(image_id = %id, error = %format!("{e:#}"), "image_probe_failed");
                ImageTypeResult::unloaded()
            }
        }
    }
}
