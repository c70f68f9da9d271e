use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::cache::ReferenceCache;
use crate::image_processing::{self, JPEG_QUALITY, MAX_DIMENSION};
use crate::search::ImageSource;

pub const MAX_DOWNLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Downloads candidate images and stores a resized JPEG copy in the cache.
#[derive(Clone, Debug)]
pub struct ImageNormalizer {
    client: Client,
    cache: ReferenceCache,
    max_bytes: usize,
}

impl ImageNormalizer {
    pub fn new(cache: ReferenceCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("failed to build download client")?;
        Ok(Self {
            client,
            cache,
            max_bytes: MAX_DOWNLOAD_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    /// Returns the cached path, or `None` when the image could not be fetched,
    /// decoded or stored. Failures are logged here and never propagate.
    pub async fn normalize(
        &self,
        remote_url: &str,
        subject: &str,
        source: ImageSource,
    ) -> Option<PathBuf> {
        debug!(provider = %source, subject, url = remote_url, "downloading reference image");
        match self.try_normalize(remote_url, subject, source).await {
            Ok(path) => {
                debug!(
                    provider = %source,
                    subject,
                    path = %path.display(),
                    "stored reference image"
                );
                Some(path)
            }
            Err(err) => {
                warn!(
                    provider = %source,
                    subject,
                    url = remote_url,
                    error = %err,
                    "failed to download reference image"
                );
                None
            }
        }
    }

    async fn try_normalize(
        &self,
        remote_url: &str,
        subject: &str,
        source: ImageSource,
    ) -> Result<PathBuf> {
        let parsed =
            Url::parse(remote_url).with_context(|| format!("invalid image url {remote_url}"))?;
        let bytes = self.download(parsed.clone()).await?;
        let jpeg = tokio::task::spawn_blocking(move || {
            image_processing::normalize_to_jpeg(&bytes, MAX_DIMENSION, JPEG_QUALITY)
        })
        .await
        .context("image processing task failed")??;
        let file_name =
            ReferenceCache::entry_name(subject, source.as_str(), &extension_of(&parsed));
        self.cache.put(&file_name, &jpeg).await
    }

    async fn download(&self, url: Url) -> Result<Vec<u8>> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {status}");
        }
        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                bail!("image too large: {length} bytes");
            }
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(anyhow!("image exceeds {} bytes", self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Extension of the URL path including the dot, `.jpg` when there is none.
pub fn extension_of(url: &Url) -> String {
    Path::new(url.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".jpg".to_string())
}
