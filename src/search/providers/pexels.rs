use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Candidate, PortraitProvider, json_or_error};
use crate::search::ImageSource;

const PEXELS_BASE_URL: &str = "https://api.pexels.com/v1";
const PEXELS_MAX_PAGE: usize = 80;

#[derive(Debug, Deserialize)]
struct PexelsResponse {
    photos: Option<Vec<PexelsPhoto>>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    src: Option<PexelsSrc>,
    alt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    medium: Option<String>,
}

pub struct PexelsSearch {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PexelsSearch {
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: PEXELS_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PortraitProvider for PexelsSearch {
    fn source(&self) -> ImageSource {
        ImageSource::Pexels
    }

    async fn find_candidates(&self, person_name: &str, count: usize) -> Result<Vec<Candidate>> {
        let query = format!("{person_name} portrait professional");
        let per_page = count.clamp(1, PEXELS_MAX_PAGE).to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url.trim_end_matches('/')))
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query.as_str()),
                ("per_page", per_page.as_str()),
                ("orientation", "portrait"),
            ])
            .send()
            .await?;
        let payload: PexelsResponse =
            serde_json::from_value(json_or_error(self.source(), response).await?)?;

        Ok(payload
            .photos
            .unwrap_or_default()
            .into_iter()
            .filter_map(|photo| {
                let url = photo.src?.medium?;
                Some(Candidate {
                    url,
                    description: photo.alt.unwrap_or_default(),
                })
            })
            .take(count)
            .collect())
    }
}
