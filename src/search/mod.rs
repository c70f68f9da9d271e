//! Portrait search across the configured image providers.
//!
//! Providers are tried in priority order (Google, Unsplash, Pexels). Each
//! candidate a provider reports is downloaded and normalized into the
//! reference cache; only candidates that made it to disk are returned.

pub mod normalizer;
pub mod providers;

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
pub use normalizer::ImageNormalizer;
use providers::{GoogleImageSearch, PexelsSearch, PortraitProvider, UnsplashSearch};

pub const DEFAULT_MAX_RESULTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Google,
    Unsplash,
    Pexels,
}

impl ImageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSource::Google => "google",
            ImageSource::Unsplash => "unsplash",
            ImageSource::Pexels => "pexels",
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub url: String,
    pub local_path: PathBuf,
    pub source: ImageSource,
    pub description: String,
    pub index: usize,
}

pub struct PortraitSearch {
    providers: Vec<Box<dyn PortraitProvider>>,
    normalizer: ImageNormalizer,
}

impl PortraitSearch {
    /// `providers` must already be in priority order.
    pub fn new(providers: Vec<Box<dyn PortraitProvider>>, normalizer: ImageNormalizer) -> Self {
        Self { providers, normalizer }
    }

    /// Registers every provider whose credentials are present in `config`.
    pub fn from_config(config: &AppConfig, normalizer: ImageNormalizer) -> Self {
        let client = Client::new();
        let mut providers: Vec<Box<dyn PortraitProvider>> = Vec::new();
        if let (Some(key), Some(engine)) = (&config.google_api_key, &config.google_engine_id) {
            providers.push(Box::new(GoogleImageSearch::new(
                client.clone(),
                key.clone(),
                engine.clone(),
            )));
        }
        if let Some(key) = &config.unsplash_access_key {
            providers.push(Box::new(UnsplashSearch::new(client.clone(), key.clone())));
        }
        if let Some(key) = &config.pexels_api_key {
            providers.push(Box::new(PexelsSearch::new(client, key.clone())));
        }
        Self::new(providers, normalizer)
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Returns at most `max_results` normalized portraits of `person_name`.
    ///
    /// Provider and download failures are logged and skipped. The only error
    /// is failing to prepare the cache directory.
    pub async fn search(&self, person_name: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let name = person_name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }
        let max_results = max_results.max(1);
        if !self.providers.is_empty() {
            self.normalizer.cache().ensure_dir().await?;
        }
        info!(subject = name, max_results, "searching for portrait references");

        let mut collected: Vec<SearchResult> = Vec::new();
        for provider in &self.providers {
            if collected.len() >= max_results {
                break;
            }
            let remaining = max_results - collected.len();
            match self.collect_from(provider.as_ref(), name, remaining).await {
                Ok(found) => {
                    debug!(
                        provider = %provider.source(),
                        subject = name,
                        found = found.len(),
                        "provider finished"
                    );
                    collected.extend(found);
                }
                Err(err) => {
                    warn!(
                        provider = %provider.source(),
                        subject = name,
                        error = %err,
                        "portrait search failed"
                    );
                }
            }
        }

        collected.truncate(max_results);
        for (position, result) in collected.iter_mut().enumerate() {
            result.index = position + 1;
        }
        if collected.is_empty() {
            info!(subject = name, "no reference image found");
        }
        Ok(collected)
    }

    async fn collect_from(
        &self,
        provider: &dyn PortraitProvider,
        name: &str,
        slots: usize,
    ) -> Result<Vec<SearchResult>> {
        let source = provider.source();
        let candidates = provider.find_candidates(name, slots + provider.overfetch()).await?;
        let mut kept = Vec::new();
        for candidate in candidates {
            if kept.len() >= slots {
                break;
            }
            let stored = self.normalizer.normalize(&candidate.url, name, source).await;
            if let Some(local_path) = stored {
                kept.push(SearchResult {
                    url: candidate.url,
                    local_path,
                    source,
                    description: candidate.description,
                    index: 0,
                });
            }
        }
        Ok(kept)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::ImageSource;
    use super::providers::{Candidate, PortraitProvider};
    use crate::image_processing::sample_png;

    /// Serves a valid PNG at `/ok/N.png` and a 404 at `/broken.png`.
    pub async fn image_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/ok/\d+\.png$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(sample_png(64, 64)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    pub struct FakeProvider {
        pub source: ImageSource,
        pub candidates: Vec<Candidate>,
        pub fail: bool,
        pub calls: Arc<AtomicUsize>,
        pub requested: Arc<AtomicUsize>,
    }

    impl FakeProvider {
        pub fn new(source: ImageSource, server: &MockServer, good: usize, broken: usize) -> Self {
            let mut candidates = Vec::new();
            for _ in 0..broken {
                candidates.push(Candidate {
                    url: format!("{}/broken.png", server.uri()),
                    description: String::new(),
                });
            }
            for i in 0..good {
                candidates.push(Candidate {
                    url: format!("{}/ok/{i}.png", server.uri()),
                    description: format!("{source} photo {i}"),
                });
            }
            Self {
                source,
                candidates,
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
                requested: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing(source: ImageSource) -> Self {
            Self {
                source,
                candidates: Vec::new(),
                fail: true,
                calls: Arc::new(AtomicUsize::new(0)),
                requested: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PortraitProvider for FakeProvider {
        fn source(&self) -> ImageSource {
            self.source
        }

        async fn find_candidates(
            &self,
            _person_name: &str,
            count: usize,
        ) -> Result<Vec<Candidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.store(count, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("{} quota exceeded", self.source));
            }
            Ok(self.candidates.iter().take(count).cloned().collect())
        }
    }
}
