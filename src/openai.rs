use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tokio::fs;
use tracing::debug;

use crate::config::AppConfig;
use crate::image_processing;

#[derive(Debug, Default, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
pub struct ImageData {
    pub b64_json: Option<String>,
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// The two image calls the caricature flow needs.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Plain text-to-image generation.
    async fn generate_image(&self, prompt: &str) -> Result<ImagesResponse>;

    /// Image edit guided by `images`, attached in order.
    async fn edit_image(&self, prompt: &str, images: &[PathBuf]) -> Result<ImagesResponse>;
}

pub struct OpenAiImages {
    client: Client,
    api_key: String,
    org_id: Option<String>,
    base_url: String,
    model: String,
    edit_model: String,
    size: String,
}

impl OpenAiImages {
    /// `None` when no API key is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let api_key = config.openai_api_key.clone()?;
        Some(Self {
            client: Client::new(),
            api_key,
            org_id: config.openai_org_id.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.image_model.clone(),
            edit_model: config.edit_model.clone(),
            size: config.image_size.clone(),
        })
    }

    fn post(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .bearer_auth(&self.api_key);
        match self.org_id.as_deref() {
            Some(org) => request.header("OpenAI-Organization", org),
            None => request,
        }
    }
}

// GPT image models always answer with base64 and reject `response_format`.
fn accepts_response_format(model: &str) -> bool {
    !model.to_ascii_lowercase().starts_with("gpt-image")
}

async fn parse_images_response(label: &str, response: reqwest::Response) -> Result<ImagesResponse> {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|body| body.error)
            .and_then(|detail| detail.message)
            .unwrap_or(text);
        return Err(anyhow!("OpenAI {label} request failed: {status} {message}"));
    }
    serde_json::from_str(&text).with_context(|| format!("OpenAI {label} returned invalid JSON"))
}

async fn image_part(path: &Path) -> Result<Part> {
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("failed reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("image.png")
        .to_string();
    // cached references keep their source extension but hold JPEG bytes
    let mime = image_processing::detect_mime_type(&bytes);
    let part = Part::bytes(bytes).file_name(file_name);
    match mime {
        Some(mime) => Ok(part.mime_str(mime)?),
        None => Ok(part),
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImages {
    async fn generate_image(&self, prompt: &str) -> Result<ImagesResponse> {
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "size": self.size,
            "n": 1,
        });
        if accepts_response_format(&self.model) {
            body["response_format"] = json!("b64_json");
        }
        debug!(model = %self.model, "requesting text-only image generation");
        let response = self.post("images/generations").json(&body).send().await?;
        parse_images_response("generations", response).await
    }

    async fn edit_image(&self, prompt: &str, images: &[PathBuf]) -> Result<ImagesResponse> {
        if images.is_empty() {
            return Err(anyhow!("image edits require at least one input image"));
        }
        let mut form = Form::new()
            .text("model", self.edit_model.clone())
            .text("prompt", prompt.to_string())
            .text("size", self.size.clone())
            .text("n", "1")
            .text("input_fidelity", "high")
            .text("background", "opaque");
        if accepts_response_format(&self.edit_model) {
            form = form.text("response_format", "b64_json");
        }
        for path in images {
            form = form.part("image[]", image_part(path).await?);
        }
        debug!(
            model = %self.edit_model,
            images = images.len(),
            "requesting reference-guided image edit"
        );
        let response = self.post("images/edits").multipart(form).send().await?;
        parse_images_response("edits", response).await
    }
}
