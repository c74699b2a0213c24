//! Generation request/result types, prompt composition, and the invoker that turns every
//! backend outcome into a [`GenerationResult`].

use crate::llm::TextBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sampling temperature for every generation call.
pub const TEMPERATURE: f32 = 0.7;

const HISTORY_HEADER: &str = "Chat history:";
const CURRENT_MESSAGE_MARKER: &str = "Current message: ";

/// Reason used when the backend answers with zero candidates or only blank text.
pub const NO_RESPONSE_REASON: &str = "no response generated from the LLM";

/// Request body of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub user_id: String,
    pub message_text: String,
    /// Prior turns, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<String>,
}

/// Why a generation produced no text. Selects the fallback reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend could not be reached or refused the call (transport, auth, rate limit).
    Unavailable,
    /// The backend answered but produced nothing usable.
    NoOutput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Success { text: String },
    Failure { kind: FailureKind, reason: String },
}

impl GenerationResult {
    pub fn failure(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            reason: reason.into(),
        }
    }

    /// `Success` for text with visible content; blank text is `NoOutput`.
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            return Self::failure(FailureKind::NoOutput, NO_RESPONSE_REASON);
        }
        Self::Success { text }
    }
}

/// Wire form of [`GenerationResult`] (response body of `POST /generate`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub response_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
}

impl From<GenerationResult> for GenerationResponse {
    fn from(result: GenerationResult) -> Self {
        match result {
            GenerationResult::Success { text } => Self {
                response_text: text,
                error: None,
                error_kind: None,
            },
            GenerationResult::Failure { kind, reason } => Self {
                response_text: String::new(),
                error: Some(reason),
                error_kind: Some(kind),
            },
        }
    }
}

impl From<GenerationResponse> for GenerationResult {
    /// A set `error` wins over any text; a missing kind or blank text means the service
    /// answered without output.
    fn from(response: GenerationResponse) -> Self {
        match response.error.filter(|e| !e.is_empty()) {
            Some(reason) => GenerationResult::Failure {
                kind: response.error_kind.unwrap_or(FailureKind::NoOutput),
                reason,
            },
            None => GenerationResult::from_text(response.response_text),
        }
    }
}

/// Anything that can answer a [`GenerationRequest`]. Never fails: errors become `Failure`.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult;
}

/// Build the prompt: the message alone, or the history block followed by the current message.
pub fn compose_prompt(request: &GenerationRequest) -> String {
    if request.history.is_empty() {
        return request.message_text.clone();
    }
    let mut prompt = String::from(HISTORY_HEADER);
    prompt.push('\n');
    for turn in &request.history {
        prompt.push_str(turn);
        prompt.push('\n');
    }
    prompt.push('\n');
    prompt.push_str(CURRENT_MESSAGE_MARKER);
    prompt.push_str(&request.message_text);
    prompt
}

/// Composes the prompt and calls the backend at [`TEMPERATURE`].
#[derive(Clone)]
pub struct Invoker {
    backend: Arc<dyn TextBackend>,
}

impl Invoker {
    pub fn new(backend: Arc<dyn TextBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Generator for Invoker {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let prompt = compose_prompt(request);
        match self.backend.complete(&prompt, TEMPERATURE).await {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(text) => GenerationResult::from_text(text),
                None => GenerationResult::failure(FailureKind::NoOutput, NO_RESPONSE_REASON),
            },
            Err(e) => {
                log::warn!("generation for {} failed: {}", request.user_id, e);
                GenerationResult::failure(
                    FailureKind::Unavailable,
                    format!("failed to generate response: {}", e),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::sync::Mutex;

    struct StubBackend {
        reply: Result<Vec<String>, String>,
        seen: Mutex<Vec<(String, f32)>>,
    }

    impl StubBackend {
        fn new(reply: Result<Vec<String>, String>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextBackend for StubBackend {
        async fn complete(&self, prompt: &str, temperature: f32) -> Result<Vec<String>, LlmError> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), temperature));
            self.reply.clone().map_err(LlmError::Api)
        }
    }

    fn request(text: &str, history: &[&str]) -> GenerationRequest {
        GenerationRequest {
            user_id: "111".to_string(),
            message_text: text.to_string(),
            history: history.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn prompt_without_history_is_message_text() {
        assert_eq!(compose_prompt(&request("hi", &[])), "hi");
        assert_eq!(compose_prompt(&request("  spaced  ", &[])), "  spaced  ");
    }

    #[test]
    fn prompt_with_history_lists_turns_in_order() {
        let prompt = compose_prompt(&request("now?", &["first", "second"]));
        assert_eq!(
            prompt,
            "Chat history:\nfirst\nsecond\n\nCurrent message: now?"
        );
        let lines: Vec<&str> = prompt.lines().collect();
        let header = lines.iter().position(|l| *l == "Chat history:").unwrap();
        let marker = lines
            .iter()
            .position(|l| l.starts_with("Current message:"))
            .unwrap();
        assert_eq!(&lines[header + 1..marker - 1], &["first", "second"]);
    }

    #[tokio::test]
    async fn first_candidate_is_the_result() {
        let backend = StubBackend::new(Ok(vec!["hello".into(), "other".into()]));
        let invoker = Invoker::new(backend.clone());
        let result = invoker.generate(&request("hi", &[])).await;
        assert_eq!(result, GenerationResult::Success { text: "hello".into() });
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[("hi".to_string(), TEMPERATURE)]);
    }

    #[tokio::test]
    async fn zero_candidates_is_no_output() {
        let invoker = Invoker::new(StubBackend::new(Ok(Vec::new())));
        let result = invoker.generate(&request("hi", &[])).await;
        assert_eq!(
            result,
            GenerationResult::failure(FailureKind::NoOutput, "no response generated from the LLM")
        );
    }

    #[tokio::test]
    async fn blank_first_candidate_is_no_output() {
        let invoker = Invoker::new(StubBackend::new(Ok(vec![" \n".into(), "later".into()])));
        let result = invoker.generate(&request("hi", &[])).await;
        assert_eq!(
            result,
            GenerationResult::failure(FailureKind::NoOutput, NO_RESPONSE_REASON)
        );
    }

    #[tokio::test]
    async fn backend_error_becomes_unavailable_with_reason() {
        let invoker = Invoker::new(StubBackend::new(Err("429 rate limited".into())));
        match invoker.generate(&request("hi", &[])).await {
            GenerationResult::Failure { kind, reason } => {
                assert_eq!(kind, FailureKind::Unavailable);
                assert!(reason.starts_with("failed to generate response:"));
                assert!(reason.contains("429 rate limited"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn response_without_kind_is_no_output() {
        let response = GenerationResponse {
            response_text: String::new(),
            error: Some("boom".into()),
            error_kind: None,
        };
        assert_eq!(
            GenerationResult::from(response),
            GenerationResult::failure(FailureKind::NoOutput, "boom")
        );
    }

    #[test]
    fn response_with_blank_text_is_no_output() {
        for text in ["", "   "] {
            let response = GenerationResponse {
                response_text: text.to_string(),
                ..GenerationResponse::default()
            };
            assert_eq!(
                GenerationResult::from(response),
                GenerationResult::failure(FailureKind::NoOutput, NO_RESPONSE_REASON)
            );
        }
        let response = GenerationResponse {
            response_text: "hello".to_string(),
            ..GenerationResponse::default()
        };
        assert_eq!(
            GenerationResult::from(response),
            GenerationResult::Success { text: "hello".into() }
        );
    }

    #[test]
    fn failure_serializes_error_fields() {
        let response = GenerationResponse::from(GenerationResult::failure(
            FailureKind::Unavailable,
            "down",
        ));
        let v = serde_json::to_value(&response).unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "response_text": "", "error": "down", "error_kind": "unavailable" })
        );
    }

    #[test]
    fn request_history_defaults_to_empty() {
        let r: GenerationRequest =
            serde_json::from_str(r#"{"user_id":"1","message_text":"hi"}"#).unwrap();
        assert!(r.history.is_empty());
    }
}
