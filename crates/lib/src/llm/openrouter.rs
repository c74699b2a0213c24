//! OpenRouter client (OpenAI-compatible chat completions).

use crate::config::OpenRouterConfig;
use crate::llm::{LlmError, TextBackend};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for the OpenRouter HTTP API.
#[derive(Clone)]
pub struct OpenRouterClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenRouterClient {
    /// Fails when no API key is configured.
    pub fn new(config: &OpenRouterConfig, timeout: Duration) -> Result<Self, LlmError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(LlmError::Config("OpenRouter API key is required".to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /chat/completions with one user message, non-streaming.
    pub async fn chat(&self, prompt: &str, temperature: f32) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let data: ChatResponse = res.json().await?;
        if let Some(err) = &data.error {
            return Err(LlmError::Api(err.message.clone()));
        }
        Ok(data)
    }
}

#[async_trait]
impl TextBackend for OpenRouterClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<Vec<String>, LlmError> {
        Ok(self.chat(prompt, temperature).await?.candidates())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

impl ChatResponse {
    /// Text of each choice that carries content, in order.
    pub fn candidates(&self) -> Vec<String> {
        self.choices
            .iter()
            .filter_map(|c| c.message.as_ref().and_then(|m| m.content.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_rejected() {
        let config = OpenRouterConfig::default();
        assert!(matches!(
            OpenRouterClient::new(&config, Duration::from_secs(1)),
            Err(LlmError::Config(_))
        ));
    }

    #[test]
    fn candidates_skip_choices_without_content() {
        let r: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": null } },
                { "message": { "role": "assistant", "content": "hello" } }
            ]
        }))
        .unwrap();
        assert_eq!(r.candidates(), vec!["hello".to_string()]);
    }

    #[test]
    fn empty_choices_have_no_candidates() {
        let r: ChatResponse = serde_json::from_str(r#"{"id":"x","choices":[]}"#).unwrap();
        assert!(r.candidates().is_empty());
    }

    #[test]
    fn request_carries_model_and_temperature() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user".into(),
                content: Some("hi".into()),
            }],
            temperature: 0.5,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["model"], "m");
        assert_eq!(v["temperature"], 0.5);
        assert_eq!(v["messages"][0]["content"], "hi");
    }
}
