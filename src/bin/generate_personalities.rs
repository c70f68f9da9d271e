use std::path::PathBuf;
use std::process::ExitCode;

use cartoonish::{
    config::AppConfig,
    openai::OpenAiImages,
    roster::{DEFAULT_OUTPUT_DIR, PAUSE_BETWEEN, PERSONALITIES, generate_roster},
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env();
    let Some(images) = OpenAiImages::from_config(&config) else {
        error!("OPENAI_API_KEY environment variable is not set");
        return ExitCode::FAILURE;
    };
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    info!(
        count = PERSONALITIES.len(),
        output = %output_dir.display(),
        "generating personality caricatures"
    );
    let outcomes = generate_roster(&images, PERSONALITIES, &output_dir, PAUSE_BETWEEN).await;

    let mut succeeded = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok((path, size)) => {
                succeeded += 1;
                println!("  ok      {}: {} ({} KB)", outcome.name, path.display(), size / 1024);
            }
            Err(err) => println!("  failed  {}: {err}", outcome.name),
        }
    }
    println!("Completed: {succeeded}/{} caricatures generated", outcomes.len());
    ExitCode::SUCCESS
}
