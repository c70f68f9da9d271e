use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use cartoonish::{
    cache::{ReferenceCache, SWEEP_INTERVAL, start_eviction},
    caricature::CaricatureGenerator,
    config::AppConfig,
    openai::{ImageGenerator, OpenAiImages},
    search::{ImageNormalizer, PortraitSearch},
    web_api::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cartoonish=debug".into()),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env();
    log_configuration(&config);

    let cache = ReferenceCache::new(config.cache_dir.clone());
    if let Err(err) = cache.ensure_dir().await {
        warn!(error = %err, "reference cache directory unavailable");
    }
    let _sweeper = start_eviction(cache.clone(), SWEEP_INTERVAL).await;

    let images = OpenAiImages::from_config(&config)
        .map(|client| Arc::new(client) as Arc<dyn ImageGenerator>);
    let search = PortraitSearch::from_config(&config, ImageNormalizer::new(cache)?);
    let generator = CaricatureGenerator::new(images, search, config.style_reference_path.clone());

    let bind_address = format!("0.0.0.0:{}", config.port);
    let public_dir = config.public_dir.clone();
    let state = AppState {
        generator: Arc::new(generator),
        config: Arc::new(config),
    };
    let router = web_api::router(state, &public_dir);
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!("Cartoonish server listening on http://{}", bind_address);

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

fn log_configuration(config: &AppConfig) {
    match config.api_key_last4() {
        Some(last4) => {
            info!("API key configured: ...{last4}");
            if let Some(org) = &config.openai_org_id {
                info!("Organization ID: {org}");
            }
        }
        None => warn!(
            "OPENAI_API_KEY is not set. Image generation requests will fail until it is provided."
        ),
    }
    if config.google_configured() {
        info!("Google Custom Search configured for reference images");
    }
    if config.unsplash_access_key.is_some() {
        info!("Unsplash configured for reference images");
    }
    if config.pexels_api_key.is_some() {
        info!("Pexels configured for reference images");
    }
    if !config.any_search_provider() {
        info!("No image search APIs configured. Will use text-only generation.");
    }
}
