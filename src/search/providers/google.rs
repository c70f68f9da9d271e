use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Candidate, PortraitProvider, json_or_error};
use crate::search::ImageSource;

const GOOGLE_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";
// Custom Search returns at most 10 items per request.
const GOOGLE_MAX_PAGE: usize = 10;

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    items: Option<Vec<GoogleItem>>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    link: Option<String>,
    title: Option<String>,
    snippet: Option<String>,
}

pub struct GoogleImageSearch {
    client: Client,
    api_key: String,
    engine_id: String,
    base_url: String,
}

impl GoogleImageSearch {
    pub fn new(client: Client, api_key: String, engine_id: String) -> Self {
        Self {
            client,
            api_key,
            engine_id,
            base_url: GOOGLE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PortraitProvider for GoogleImageSearch {
    fn source(&self) -> ImageSource {
        ImageSource::Google
    }

    fn overfetch(&self) -> usize {
        8
    }

    async fn find_candidates(&self, person_name: &str, count: usize) -> Result<Vec<Candidate>> {
        let query = format!("{person_name} portrait professional headshot");
        let num = count.clamp(1, GOOGLE_MAX_PAGE).to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query.as_str()),
                ("searchType", "image"),
                ("num", num.as_str()),
                ("imgSize", "medium"),
                ("imgType", "photo"),
                ("safe", "medium"),
            ])
            .send()
            .await?;
        let payload: GoogleResponse =
            serde_json::from_value(json_or_error(self.source(), response).await?)?;

        Ok(payload
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let url = item.link?;
                let description = item
                    .title
                    .filter(|value| !value.trim().is_empty())
                    .or(item.snippet)
                    .unwrap_or_default();
                Some(Candidate { url, description })
            })
            .take(count)
            .collect())
    }
}
