use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Candidate, PortraitProvider, json_or_error};
use crate::search::ImageSource;

const UNSPLASH_BASE_URL: &str = "https://api.unsplash.com";
const UNSPLASH_MAX_PAGE: usize = 30;

#[derive(Debug, Deserialize)]
struct UnsplashResponse {
    results: Option<Vec<UnsplashPhoto>>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    urls: Option<UnsplashUrls>,
    description: Option<String>,
    alt_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    regular: Option<String>,
}

pub struct UnsplashSearch {
    client: Client,
    access_key: String,
    base_url: String,
}

impl UnsplashSearch {
    pub fn new(client: Client, access_key: String) -> Self {
        Self {
            client,
            access_key,
            base_url: UNSPLASH_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PortraitProvider for UnsplashSearch {
    fn source(&self) -> ImageSource {
        ImageSource::Unsplash
    }

    async fn find_candidates(&self, person_name: &str, count: usize) -> Result<Vec<Candidate>> {
        let query = format!("{person_name} portrait professional headshot");
        let per_page = count.clamp(1, UNSPLASH_MAX_PAGE).to_string();
        let response = self
            .client
            .get(format!("{}/search/photos", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .query(&[
                ("query", query.as_str()),
                ("per_page", per_page.as_str()),
                ("orientation", "portrait"),
            ])
            .send()
            .await?;
        let payload: UnsplashResponse =
            serde_json::from_value(json_or_error(self.source(), response).await?)?;

        Ok(payload
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|photo| {
                let url = photo.urls?.regular?;
                let description = photo
                    .description
                    .filter(|value| !value.trim().is_empty())
                    .or(photo.alt_description)
                    .unwrap_or_default();
                Some(Candidate { url, description })
            })
            .take(count)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_regular_urls_with_alt_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/photos"))
            .and(header("Authorization", "Client-ID u-key"))
            .and(query_param("orientation", "portrait"))
            .and(query_param("per_page", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {
                        "urls": {"regular": "https://images.unsplash.example/a"},
                        "description": null,
                        "alt_description": "man in suit"
                    },
                    {"urls": {}, "description": "skipped"},
                    {
                        "urls": {"regular": "https://images.unsplash.example/b"},
                        "description": "stage photo"
                    },
                    {
                        "urls": {"regular": "https://images.unsplash.example/c"},
                        "description": "  ",
                        "alt_description": "woman at a podium"
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            UnsplashSearch::new(Client::new(), "u-key".into()).with_base_url(server.uri());
        let candidates = provider.find_candidates("Jon Stewart", 7).await.unwrap();

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].description, "man in suit");
        assert_eq!(candidates[1].url, "https://images.unsplash.example/b");
        assert_eq!(candidates[2].description, "woman at a podium");
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": "nope"})))
            .mount(&server)
            .await;

        let provider = UnsplashSearch::new(Client::new(), "u".into()).with_base_url(server.uri());
        assert!(provider.find_candidates("Anyone", 3).await.is_err());
    }
}
