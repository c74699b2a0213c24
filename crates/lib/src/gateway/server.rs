//! Gateway HTTP server: `/health`, `/webhook` (GET/POST) and `/generate` (POST).

use crate::config::Config;
use crate::gateway::proxy;
use crate::http;
use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Upstream targets and the shared outbound client.
#[derive(Clone)]
pub struct GatewayState {
    webhook_url: Arc<str>,
    generate_url: Arc<str>,
    max_body_bytes: usize,
    client: reqwest::Client,
}

impl GatewayState {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeouts.proxy())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("building proxy client")?;
        Ok(Self {
            webhook_url: upstream(&config.services.messaging_url, "/webhook").into(),
            generate_url: upstream(&config.services.generation_url, "/generate").into(),
            max_body_bytes: config.gateway.max_body_bytes,
            client,
        })
    }
}

fn upstream(base: &str, path: &str) -> String {
    format!("{}{}", base.trim().trim_end_matches('/'), path)
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(http::health))
        .route("/webhook", get(proxy_webhook).post(proxy_webhook))
        .route("/generate", post(proxy_generate))
        .with_state(state)
}

/// Run the gateway on `config.server`. Blocks until shutdown.
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = GatewayState::new(&config)?;
    log::info!(
        "gateway routes: /webhook -> {}, /generate -> {}",
        state.webhook_url,
        state.generate_url
    );
    http::serve(
        "gateway",
        router(state),
        &config.server.bind_addr(),
        config.timeouts.request(),
    )
    .await
}

async fn proxy_webhook(State(state): State<GatewayState>, req: Request) -> Response {
    proxy::forward(&state.client, &state.webhook_url, req, state.max_body_bytes).await
}

async fn proxy_generate(State(state): State<GatewayState>, req: Request) -> Response {
    proxy::forward(&state.client, &state.generate_url, req, state.max_body_bytes).await
}
