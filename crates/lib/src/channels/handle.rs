//! Outbound side of a channel.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("send request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("send api error: status {status}: {body}")]
    Api { status: u16, body: String },
}

/// Handle to a channel that can deliver text to a recipient.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "whatsapp").
    fn id(&self) -> &str;
    /// Send a text message to a recipient (e.g. WhatsApp phone number).
    async fn send_message(&self, recipient_id: &str, text: &str) -> Result<(), ChannelError>;
}
