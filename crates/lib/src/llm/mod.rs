//! Text generation: the backend abstraction, the OpenRouter client, the invoker that
//! composes prompts, the generation service, and the HTTP client the relay uses to reach it.

mod client;
mod generation;
mod openrouter;
mod service;

pub use client::GenerationServiceClient;
pub use generation::{
    compose_prompt, FailureKind, GenerationRequest, GenerationResponse, GenerationResult,
    Generator, Invoker, NO_RESPONSE_REASON, TEMPERATURE,
};
pub use openrouter::{ChatResponse, OpenRouterClient};
pub use service::{router, run_generation_service};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llm api error: {0}")]
    Api(String),
    #[error("llm client misconfigured: {0}")]
    Config(String),
}

/// A language-model backend: prompt in, candidate texts out (first is preferred).
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<Vec<String>, LlmError>;
}
