//! Offline generation of the built-in personality roster.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::fs;
use tracing::{info, warn};

use crate::cache::sanitize_name;
use crate::caricature::text_only_prompt;
use crate::openai::ImageGenerator;

pub const DEFAULT_OUTPUT_DIR: &str = "personalities-realistic";
pub const PAUSE_BETWEEN: Duration = Duration::from_secs(2);

pub struct Personality {
    pub name: &'static str,
    pub traits: &'static str,
}

pub const PERSONALITIES: &[Personality] = &[
    Personality {
        name: "Judge Judy",
        traits: "No-nonsense, snappy judgments",
    },
    Personality {
        name: "Jon Stewart",
        traits: "Witty, fair, skeptical",
    },
    Personality {
        name: "Oprah Winfrey",
        traits: "Empathetic, centered",
    },
    Personality {
        name: "Joe Rogan",
        traits: "Curious, slightly chaotic",
    },
    Personality {
        name: "Anderson Cooper",
        traits: "Calm, mainstream neutral",
    },
    Personality {
        name: "Gandalf",
        traits: "Wise, grandfatherly neutrality",
    },
    Personality {
        name: "Morpheus",
        traits: "Visionary, cryptic",
    },
    Personality {
        name: "HAL 9000",
        traits: "Unsettling AI neutrality",
    },
    Personality {
        name: "J.A.R.V.I.S.",
        traits: "Calm AI guidance",
    },
    Personality {
        name: "GLaDOS",
        traits: "Darkly sarcastic moderation",
    },
    Personality {
        name: "C-3PO",
        traits: "Overly polite and procedural",
    },
    Personality {
        name: "Ron Swanson",
        traits: "Dry libertarian neutrality",
    },
    Personality {
        name: "Chris Wallace",
        traits: "Professional, confrontational",
    },
    Personality {
        name: "Morgan Freeman",
        traits: "Authoritative, soothing",
    },
    Personality {
        name: "The Arbiter AI",
        traits: "Customizable, persona-free baseline",
    },
];

#[derive(Debug)]
pub struct RosterOutcome {
    pub name: &'static str,
    pub result: Result<(PathBuf, usize)>,
}

pub fn output_file_name(name: &str) -> String {
    format!("{}-realistic-caricature.png", sanitize_name(name))
}

async fn generate_one(
    images: &dyn ImageGenerator,
    personality: &Personality,
    output_dir: &Path,
) -> Result<(PathBuf, usize)> {
    let response = images.generate_image(&text_only_prompt(personality.name)).await?;
    let image = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No image data"))?;
    let encoded = image.b64_json.ok_or_else(|| anyhow!("No image data"))?;
    let bytes = BASE64.decode(encoded.as_bytes()).context("invalid base64 image data")?;

    fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path = output_dir.join(output_file_name(personality.name));
    fs::write(&path, &bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    if let Some(revised) = image.revised_prompt {
        info!(name = personality.name, revised_prompt = %revised, "revised prompt");
    }
    Ok((path, bytes.len()))
}

/// Generates every personality in order. A failing personality is recorded and
/// the run continues with the next one.
pub async fn generate_roster(
    images: &dyn ImageGenerator,
    personalities: &'static [Personality],
    output_dir: &Path,
    pause: Duration,
) -> Vec<RosterOutcome> {
    let mut outcomes = Vec::with_capacity(personalities.len());
    for (position, personality) in personalities.iter().enumerate() {
        info!(
            "[{}/{}] Generating {} ({})",
            position + 1,
            personalities.len(),
            personality.name,
            personality.traits
        );
        let result = generate_one(images, personality, output_dir).await;
        match &result {
            Ok((path, size)) => info!(
                name = personality.name,
                path = %path.display(),
                size_kb = size / 1024,
                "saved"
            ),
            Err(err) => warn!(name = personality.name, error = %err, "generation failed"),
        }
        outcomes.push(RosterOutcome {
            name: personality.name,
            result,
        });
        if position + 1 < personalities.len() && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caricature::test_support::FakeImages;
    use crate::openai::{ImageData, ImagesResponse};
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct Base64Images {
        fail_for: &'static str,
    }

    #[async_trait]
    impl ImageGenerator for Base64Images {
        async fn generate_image(&self, prompt: &str) -> Result<ImagesResponse> {
            if prompt.contains(self.fail_for) {
                return Err(anyhow!("rate limited"));
            }
            Ok(ImagesResponse {
                data: vec![ImageData {
                    b64_json: Some(BASE64.encode(b"png-bytes")),
                    revised_prompt: None,
                }],
            })
        }

        async fn edit_image(&self, _prompt: &str, _images: &[PathBuf]) -> Result<ImagesResponse> {
            unreachable!("roster generation never edits")
        }
    }

    #[test]
    fn output_names_are_sanitized() {
        assert_eq!(
            output_file_name("J.A.R.V.I.S."),
            "j-a-r-v-i-s--realistic-caricature.png"
        );
        assert_eq!(output_file_name("HAL 9000"), "hal-9000-realistic-caricature.png");
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_roster() {
        const ROSTER: &[Personality] = &[
            Personality {
                name: "Gandalf",
                traits: "Wise",
            },
            Personality {
                name: "GLaDOS",
                traits: "Sarcastic",
            },
            Personality {
                name: "Morpheus",
                traits: "Cryptic",
            },
        ];
        let dir = tempfile::tempdir().unwrap();
        let images = Base64Images { fail_for: "GLaDOS" };

        let outcomes = generate_roster(&images, ROSTER, dir.path(), Duration::ZERO).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        let (path, size) = outcomes[2].result.as_ref().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"png-bytes");
        assert_eq!(*size, 9);
    }

    #[tokio::test]
    async fn non_base64_payload_is_a_failure() {
        const ROSTER: &[Personality] = &[Personality {
            name: "C-3PO",
            traits: "Polite",
        }];
        let dir = tempfile::tempdir().unwrap();
        // the fake returns "text-image", which is not valid base64
        let images = FakeImages::default();
        let outcomes = generate_roster(&images, ROSTER, dir.path(), Duration::ZERO).await;
        assert!(outcomes[0].result.is_err());
        assert!(!dir.path().join(output_file_name("C-3PO")).exists());
    }
}
