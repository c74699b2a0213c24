//! Generation service: `POST /generate` over any [`Generator`] (OpenRouter in production).

use crate::config::Config;
use crate::http;
use crate::llm::{GenerationRequest, GenerationResponse, Generator, Invoker, OpenRouterClient};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn router(generator: Arc<dyn Generator>) -> Router {
    Router::new()
        .route("/health", get(http::health))
        .route("/generate", post(generate))
        .with_state(generator)
}

/// Run the generation service on `config.server`. Fails fast without an OpenRouter API key.
pub async fn run_generation_service(config: Config) -> Result<()> {
    let backend = OpenRouterClient::new(&config.openrouter, config.timeouts.generation())
        .context("creating OpenRouter client")?;
    log::info!("generation backend: openrouter model {}", backend.model());
    let invoker = Invoker::new(Arc::new(backend));
    http::serve(
        "generation service",
        router(Arc::new(invoker)),
        &config.server.bind_addr(),
        config.timeouts.generation(),
    )
    .await
}

/// 200 with a `GenerationResponse` even when generation failed (the `error` field is set).
async fn generate(State(generator): State<Arc<dyn Generator>>, body: Bytes) -> Response {
    let request: GenerationRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("generate: invalid body: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid request body").into_response();
        }
    };
    let response = GenerationResponse::from(generator.generate(&request).await);
    match serde_json::to_vec(&response) {
        Ok(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
        Err(e) => {
            log::warn!("generate: encoding response failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate response").into_response()
        }
    }
}
