use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use tower_http::services::{ServeDir, ServeFile};
use tracing::error;

use crate::caricature::{CaricatureGenerator, CaricatureResult};
use crate::config::AppConfig;
use crate::error::CaricatureError;

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<CaricatureGenerator>,
    pub config: Arc<AppConfig>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub results: Vec<CaricatureResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub api_key_configured: bool,
    pub api_key_last4: Option<String>,
    pub org_id_configured: bool,
    pub org_id: Option<String>,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorResponse { error: message.to_string() })).into_response()
}

impl IntoResponse for CaricatureError {
    fn into_response(self) -> Response {
        let status = match self {
            CaricatureError::Validation(_) => StatusCode::BAD_REQUEST,
            CaricatureError::Configuration(_) | CaricatureError::ExternalService(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        json_error(status, &self.to_string())
    }
}

const NAMES_REQUIRED: &str =
    "Request body must include \"names\" as a string or an array of strings.";

pub fn router(state: AppState, public_dir: &Path) -> Router {
    let static_files =
        ServeDir::new(public_dir).fallback(ServeFile::new(public_dir.join("index.html")));
    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/info", get(info))
        .fallback_service(static_files)
        .with_state(state)
}

/// Turns the `names` field into trimmed, non-empty, de-duplicated names in
/// their original order. A string is split on commas and newlines; in a list,
/// entries that are not strings are ignored.
pub fn parse_names(names: Option<&Value>) -> Result<Vec<String>, CaricatureError> {
    let raw: Vec<&str> = match names {
        Some(Value::String(text)) => text.split([',', '\n']).collect(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => {
            return Err(CaricatureError::Validation(NAMES_REQUIRED.to_string()));
        }
    };

    let mut parsed: Vec<String> = Vec::new();
    for name in raw.into_iter().map(str::trim).filter(|name| !name.is_empty()) {
        if !parsed.iter().any(|existing| existing == name) {
            parsed.push(name.to_string());
        }
    }
    if parsed.is_empty() {
        return Err(CaricatureError::Validation(
            "Please provide at least one valid name.".to_string(),
        ));
    }
    Ok(parsed)
}

/// Generates one caricature per name, strictly in order. The first failure
/// aborts the batch and the results gathered so far are dropped.
pub async fn handle_batch(
    generator: &CaricatureGenerator,
    names: &[String],
) -> Result<Vec<CaricatureResult>, CaricatureError> {
    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let result = generator.generate(name).await.inspect_err(|err| {
            error!(subject = %name, error = %err, "image generation failed");
        })?;
        results.push(result);
    }
    Ok(results)
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(_) => {
            return CaricatureError::Validation(NAMES_REQUIRED.to_string()).into_response();
        }
    };
    let names = match parse_names(body.get("names")) {
        Ok(names) => names,
        Err(err) => return err.into_response(),
    };
    match handle_batch(&state.generator, &names).await {
        Ok(results) => (StatusCode::OK, Json(GenerateResponse { results })).into_response(),
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    let config = &state.config;
    Json(InfoResponse {
        api_key_configured: config.openai_api_key.is_some(),
        api_key_last4: config.api_key_last4(),
        org_id_configured: config.openai_org_id.is_some(),
        org_id: config.openai_org_id.clone(),
    })
}
