use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_EDIT_MODEL: &str = "gpt-image-1";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
const DEFAULT_STYLE_REFERENCE: &str = "assets/style-reference.png";
const DEFAULT_PUBLIC_DIR: &str = "public";

/// Process configuration. Every credential is optional: a missing search key
/// disables that provider, a missing OpenAI key disables generation.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub openai_org_id: Option<String>,
    pub openai_base_url: String,
    pub image_model: String,
    pub edit_model: String,
    pub image_size: String,
    pub google_api_key: Option<String>,
    pub google_engine_id: Option<String>,
    pub unsplash_access_key: Option<String>,
    pub pexels_api_key: Option<String>,
    pub cache_dir: PathBuf,
    pub style_reference_path: PathBuf,
    pub public_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values are
    /// treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let cache_dir = get("CACHE_DIR").map(PathBuf::from).unwrap_or_else(|| {
            let mut base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
            base.push("cartoonish");
            base
        });

        Self {
            port: get("PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_org_id: get("OPENAI_ORG_ID"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            image_model: get("OPENAI_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            edit_model: get("OPENAI_EDIT_MODEL").unwrap_or_else(|| DEFAULT_EDIT_MODEL.to_string()),
            image_size: get("OPENAI_IMAGE_SIZE").unwrap_or_else(|| DEFAULT_IMAGE_SIZE.to_string()),
            google_api_key: get("GOOGLE_API_KEY"),
            google_engine_id: get("GOOGLE_SEARCH_ENGINE_ID"),
            unsplash_access_key: get("UNSPLASH_ACCESS_KEY"),
            pexels_api_key: get("PEXELS_API_KEY"),
            cache_dir,
            style_reference_path: get("STYLE_REFERENCE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STYLE_REFERENCE)),
            public_dir: get("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLIC_DIR)),
        }
    }

    pub fn google_configured(&self) -> bool {
        self.google_api_key.is_some() && self.google_engine_id.is_some()
    }

    pub fn any_search_provider(&self) -> bool {
        self.google_configured()
            || self.unsplash_access_key.is_some()
            || self.pexels_api_key.is_some()
    }

    pub fn api_key_last4(&self) -> Option<String> {
        self.openai_api_key.as_deref().map(last4)
    }
}

fn last4(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}
