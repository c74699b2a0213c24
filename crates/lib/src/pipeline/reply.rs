//! Reply delivery: generated text, or a fixed fallback when generation failed.

use crate::channels::ChannelHandle;
use crate::llm::{FailureKind, GenerationResult};
use std::sync::Arc;

/// Sent when the generation backend could not be reached or called.
pub const UNAVAILABLE_FALLBACK: &str =
    "Sorry, I'm having trouble processing your message right now.";

/// Sent when the backend answered without usable output.
pub const NO_OUTPUT_FALLBACK: &str = "Sorry, I couldn't generate a response for your message.";

/// Text the user receives for a generation result.
pub fn reply_text(result: &GenerationResult) -> &str {
    match result {
        GenerationResult::Success { text } => text.as_str(),
        GenerationResult::Failure {
            kind: FailureKind::Unavailable,
            ..
        } => UNAVAILABLE_FALLBACK,
        GenerationResult::Failure {
            kind: FailureKind::NoOutput,
            ..
        } => NO_OUTPUT_FALLBACK,
    }
}

/// What happened to one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub text: String,
    pub delivered: bool,
}

#[derive(Clone)]
pub struct ReplySender {
    channel: Arc<dyn ChannelHandle>,
}

impl ReplySender {
    pub fn new(channel: Arc<dyn ChannelHandle>) -> Self {
        Self { channel }
    }

    /// Send exactly once. Delivery failures are logged, never retried or propagated.
    pub async fn reply(&self, recipient_id: &str, result: &GenerationResult) -> ReplyOutcome {
        if let GenerationResult::Failure { kind, reason } = result {
            log::warn!("generation for {} failed ({:?}): {}", recipient_id, kind, reason);
        }
        let text = reply_text(result);
        let delivered = match self.channel.send_message(recipient_id, text).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "{}: failed to send reply to {}: {}",
                    self.channel.id(),
                    recipient_id,
                    e
                );
                false
            }
        };
        ReplyOutcome {
            text: text.to_string(),
            delivered,
        }
    }
}
