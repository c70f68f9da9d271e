//! Caricature generation: reference-guided when possible, text-only otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cache::ReferenceCache;
use crate::error::{CaricatureError, Result};
use crate::openai::{ImageGenerator, ImagesResponse};
use crate::search::{DEFAULT_MAX_RESULTS, ImageSource, PortraitSearch, SearchResult};

pub const MAX_REFERENCES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSource {
    Google,
    Unsplash,
    Pexels,
    Mixed,
}

impl From<ImageSource> for ReferenceSource {
    fn from(source: ImageSource) -> Self {
        match source {
            ImageSource::Google => ReferenceSource::Google,
            ImageSource::Unsplash => ReferenceSource::Unsplash,
            ImageSource::Pexels => ReferenceSource::Pexels,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaricatureResult {
    pub name: String,
    pub image_base64: String,
    pub revised_prompt: Option<String>,
    pub used_reference_images: bool,
    pub reference_source: Option<ReferenceSource>,
    pub reference_count: usize,
}

pub struct CaricatureGenerator {
    images: Option<Arc<dyn ImageGenerator>>,
    search: PortraitSearch,
    style_reference: PathBuf,
}

impl CaricatureGenerator {
    /// `images` is `None` when no generation credential is configured; every
    /// call to [`CaricatureGenerator::generate`] then fails.
    pub fn new(
        images: Option<Arc<dyn ImageGenerator>>,
        search: PortraitSearch,
        style_reference: PathBuf,
    ) -> Self {
        Self {
            images,
            search,
            style_reference,
        }
    }

    pub async fn generate(&self, name: &str) -> Result<CaricatureResult> {
        let images = self.images.as_ref().ok_or_else(|| {
            CaricatureError::Configuration(
                "OpenAI API key is not configured. Set OPENAI_API_KEY to generate images."
                    .to_string(),
            )
        })?;
        info!(subject = name, "generating caricature");

        let references = match self.search.search(name, DEFAULT_MAX_RESULTS).await {
            Ok(found) => found,
            Err(err) => {
                warn!(subject = name, error = %err, "could not search for reference images");
                Vec::new()
            }
        };
        let references = usable_references(references).await;
        let style_available = ReferenceCache::exists(&self.style_reference).await;

        let mut guided: Option<(ImagesResponse, Vec<SearchResult>)> = None;
        if style_available && !references.is_empty() {
            info!(subject = name, count = references.len(), "using reference images");
            let prompt = reference_prompt(name, &references);
            let mut attachments = vec![self.style_reference.clone()];
            attachments.extend(references.iter().map(|reference| reference.local_path.clone()));
            match images.edit_image(&prompt, &attachments).await {
                Ok(response) => guided = Some((response, references)),
                Err(err) => {
                    warn!(
                        subject = name,
                        error = %err,
                        "reference-guided generation failed, falling back to text-only"
                    );
                }
            }
        } else if references.is_empty() {
            info!(subject = name, "no reference images found, using text-only generation");
        } else {
            info!(
                subject = name,
                path = %self.style_reference.display(),
                "style reference missing, using text-only generation"
            );
        }

        let (response, used) = match guided {
            Some((response, used)) => (response, used),
            None => {
                let response = images
                    .generate_image(&text_only_prompt(name))
                    .await
                    .map_err(|err| CaricatureError::ExternalService(err.to_string()))?;
                (response, Vec::new())
            }
        };

        let image = response.data.into_iter().next().ok_or_else(no_image_data)?;
        let image_base64 = image
            .b64_json
            .filter(|data| !data.is_empty())
            .ok_or_else(no_image_data)?;

        Ok(CaricatureResult {
            name: name.to_string(),
            image_base64,
            revised_prompt: image.revised_prompt,
            used_reference_images: !used.is_empty(),
            reference_source: combined_source(&used),
            reference_count: used.len(),
        })
    }
}

fn no_image_data() -> CaricatureError {
    CaricatureError::ExternalService("No image data returned from OpenAI.".to_string())
}

async fn usable_references(references: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut usable = Vec::new();
    for reference in references {
        if usable.len() >= MAX_REFERENCES {
            break;
        }
        if ReferenceCache::exists(&reference.local_path).await {
            usable.push(reference);
        }
    }
    usable
}

fn combined_source(references: &[SearchResult]) -> Option<ReferenceSource> {
    let first = references.first()?.source;
    if references.iter().all(|reference| reference.source == first) {
        Some(first.into())
    } else {
        Some(ReferenceSource::Mixed)
    }
}

pub fn text_only_prompt(name: &str) -> String {
    let subject = name.strip_suffix('.').unwrap_or(name);
    format!(
        "Create a realistic caricature of {subject}. Make it recognizable with subtle \
         exaggeration of distinctive features. Professional quality, clean background, \
         suitable for web display."
    )
}

// Hand-written likeness hints for subjects the image models tend to get wrong.
const SUBJECT_FEATURES: &[(&str, &str, &[&str])] = &[
    (
        "oprah",
        "OPRAH WINFREY (the famous talk show host)",
        &[
            "African American woman with warm, rich skin tone",
            "Curly, voluminous hair, often styled in loose curls or waves",
            "Bright, expressive eyes and warm smile",
            "Full lips and strong, confident facial features",
        ],
    ),
    (
        "einstein",
        "ALBERT EINSTEIN (the famous physicist)",
        &[
            "Wild, unkempt white hair that sticks out in all directions",
            "Prominent mustache",
            "Deep-set, intelligent eyes",
            "Wrinkled, thoughtful expression",
        ],
    ),
];

fn subject_features(name: &str) -> Option<(&'static str, &'static [&'static str])> {
    let lowered = name.to_lowercase();
    SUBJECT_FEATURES
        .iter()
        .find(|(needle, _, _)| lowered.contains(needle))
        .map(|(_, label, features)| (*label, *features))
}

/// Instruction for the image edit call. The first attached image is the style
/// exemplar, the following ones are `references` in order.
pub fn reference_prompt(name: &str, references: &[SearchResult]) -> String {
    let mut prompt = format!(
        "Create a caricature of {name}.\n\n\
         IMAGE 1 is the STYLE REFERENCE: copy its art style exactly (thick dark outlines, limited \
         color palette, comic book aesthetic with cel-shaded shadows). Do not copy its subject.\n"
    );
    for (position, reference) in references.iter().enumerate() {
        let description = reference.description.trim();
        let description = if description.is_empty() { "no description" } else { description };
        prompt.push_str(&format!(
            "IMAGE {} is a LIKENESS REFERENCE of {name} (source: {}, {description}).\n",
            position + 2,
            reference.source,
        ));
    }
    if let Some((label, features)) = subject_features(name) {
        prompt.push_str(&format!("\nDISTINCTIVE FEATURES of {label}:\n"));
        for feature in features {
            prompt.push_str(&format!("- {feature}\n"));
        }
    }
    prompt.push_str(&format!(
        "\nUse the likeness references to capture {name}'s distinctive facial features, hair and \
         characteristics with subtle exaggeration. The result must be clearly recognizable as \
         {name}, drawn in the style reference's exact artistic style. Professional quality, clean \
         opaque background, suitable for web display."
    ));
    prompt
}
