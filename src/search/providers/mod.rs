pub mod google;
pub mod pexels;
pub mod unsplash;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::search::ImageSource;

pub use google::GoogleImageSearch;
pub use pexels::PexelsSearch;
pub use unsplash::UnsplashSearch;

/// Candidate image reported by a provider, before it is downloaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub description: String,
}

#[async_trait]
pub trait PortraitProvider: Send + Sync {
    fn source(&self) -> ImageSource;

    /// Extra candidates requested on top of the open slots, absorbing
    /// candidates that fail to download.
    fn overfetch(&self) -> usize {
        6
    }

    async fn find_candidates(&self, person_name: &str, count: usize) -> Result<Vec<Candidate>>;
}

pub(crate) async fn json_or_error(
    provider: ImageSource,
    response: reqwest::Response,
) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        bail!("{provider} search failed: {status} {}", truncate(&text, 256));
    }
    Ok(response.json().await?)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
