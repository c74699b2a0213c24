//! Relay-side client for the generation service (`POST {base}/generate`).

use crate::llm::generation::{
    FailureKind, GenerationRequest, GenerationResponse, GenerationResult, Generator,
};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Clone)]
pub struct GenerationServiceClient {
    generate_url: String,
    client: reqwest::Client,
}

impl GenerationServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            generate_url: format!("{}/generate", base_url.trim_end_matches('/')),
            client,
        })
    }

    async fn call(&self, request: &GenerationRequest) -> Result<GenerationResponse, String> {
        let res = self
            .client
            .post(&self.generate_url)
            .json(request)
            .send()
            .await
            .map_err(|e| format!("failed to call generation service: {}", e))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("generation service returned {}: {}", status, body.trim()));
        }
        res.json::<GenerationResponse>()
            .await
            .map_err(|e| format!("failed to decode generation response: {}", e))
    }
}

#[async_trait]
impl Generator for GenerationServiceClient {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        match self.call(request).await {
            Ok(response) => response.into(),
            Err(reason) => {
                log::warn!("{}", reason);
                GenerationResult::failure(FailureKind::Unavailable, reason)
            }
        }
    }
}
