//! WhatsApp Cloud API: webhook wire schema and the send-message client.

use crate::channels::handle::{ChannelError, ChannelHandle};
use crate::config::WhatsAppConfig;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Webhook POST body. Missing or `null` fields read as empty, so only malformed JSON
/// fails to decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default, deserialize_with = "null_as_default")]
    pub field: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: WebhookValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub messaging_product: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contacts: Vec<WebhookContact>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_phone_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookContact {
    #[serde(default, deserialize_with = "null_as_default")]
    pub wa_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub profile: Option<WebhookProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookProfile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub from: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Unix seconds, as a string.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub message_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: Option<WebhookText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookText {
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
}

/// Reads JSON `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: SendText<'a>,
}

#[derive(Debug, Serialize)]
struct SendText<'a> {
    preview_url: bool,
    body: &'a str,
}

/// Sends text replies via `POST {api_url}/{phone_id}/messages`.
#[derive(Clone)]
pub struct WhatsAppClient {
    id: String,
    api_url: String,
    token: String,
    phone_id: String,
    client: reqwest::Client,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig, timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id: "whatsapp".to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            phone_id: config.phone_id.clone(),
            client,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_url, self.phone_id)
    }

    /// Send a text message to a WhatsApp user. One attempt; no retry.
    pub async fn send_message(&self, to: &str, text: &str) -> Result<(), ChannelError> {
        let body = SendMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            message_type: "text",
            text: SendText {
                preview_url: false,
                body: text,
            },
        };
        let res = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        if status.is_client_error() || status.is_server_error() {
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelHandle for WhatsAppClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, recipient_id: &str, text: &str) -> Result<(), ChannelError> {
        WhatsAppClient::send_message(self, recipient_id, text).await
    }
}
