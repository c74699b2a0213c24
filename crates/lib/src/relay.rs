//! Messaging service: webhook verification, webhook ingestion, and the relay pipeline behind it.

use crate::channels::{normalize, WebhookPayload, WhatsAppClient};
use crate::config::{self, Config};
use crate::http;
use crate::llm::GenerationServiceClient;
use crate::pipeline::{DispatchError, Dispatcher, ReplySender};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RelayState {
    verify_token: Arc<str>,
    dispatcher: Dispatcher,
}

impl RelayState {
    pub fn new(verify_token: &str, dispatcher: Dispatcher) -> Self {
        Self {
            verify_token: verify_token.into(),
            dispatcher,
        }
    }
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(http::health))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state)
}

/// Run the messaging service on `config.server`. Blocks until shutdown, then waits (up to
/// `dispatch.drainSecs`) for in-flight relays.
pub async fn run_messaging_service(config: Config) -> Result<()> {
    let whatsapp = WhatsAppClient::new(&config.whatsapp, config.timeouts.send())
        .context("building WhatsApp client")?;
    let generator = GenerationServiceClient::new(
        &config.services.generation_url,
        config.timeouts.generation(),
    )
    .context("building generation service client")?;
    if config.whatsapp.token.is_empty() || config.whatsapp.phone_id.is_empty() {
        log::warn!("WhatsApp token or phone id not configured; replies will fail");
    }

    let (dispatcher, dispatch_task) = Dispatcher::start(
        &config.dispatch,
        Arc::new(generator),
        ReplySender::new(Arc::new(whatsapp)),
    );
    let state = RelayState::new(config::resolve_verify_token(&config), dispatcher);
    http::serve(
        "messaging service",
        router(state),
        &config.server.bind_addr(),
        config.timeouts.request(),
    )
    .await?;

    let drain = Duration::from_secs(config.dispatch.drain_secs);
    if tokio::time::timeout(drain, dispatch_task).await.is_err() {
        log::warn!("in-flight relays did not finish within {:?}", drain);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /webhook: subscription handshake. Echo `hub.challenge` when mode and token match.
async fn verify_webhook(
    State(state): State<RelayState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let token_ok = !state.verify_token.is_empty()
        && params.verify_token.as_deref() == Some(&*state.verify_token);
    if params.mode.as_deref() == Some("subscribe") && token_ok {
        log::info!("webhook verified");
        return params.challenge.unwrap_or_default().into_response();
    }
    log::warn!("webhook verification rejected (mode {:?})", params.mode);
    (StatusCode::BAD_REQUEST, "Invalid request").into_response()
}

/// POST /webhook: decode, normalize, hand off to the dispatcher, acknowledge.
async fn receive_webhook(State(state): State<RelayState>, body: Bytes) -> Response {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::debug!("webhook: invalid body: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid request body").into_response();
        }
    };
    let messages = normalize(&payload);
    if messages.is_empty() {
        return StatusCode::OK.into_response();
    }
    for message in &messages {
        log::info!(
            "received message {} from {}: {}",
            message.id,
            message.sender_id,
            message.text
        );
    }
    match state.dispatcher.submit(messages) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(DispatchError::Saturated) => {
            log::warn!("webhook: dispatch queue full, asking sender to retry");
            (StatusCode::SERVICE_UNAVAILABLE, "Busy, retry later").into_response()
        }
        Err(DispatchError::Closed) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to process webhook").into_response()
        }
    }
}
