//! Webhook payload -> ordered text messages.

use crate::channels::inbound::Message;
use crate::channels::whatsapp::{WebhookMessage, WebhookPayload};
use chrono::{DateTime, Utc};

/// `object` value of payloads sent for a WhatsApp Business Account.
pub const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";

const MESSAGES_FIELD: &str = "messages";
const TEXT_TYPE: &str = "text";

/// Flatten a decoded webhook into text messages, preserving payload order.
///
/// Payloads for other account types yield nothing. Non-text entries (images, location, ...)
/// and text entries without a body or sender are skipped.
pub fn normalize(payload: &WebhookPayload) -> Vec<Message> {
    if payload.object != BUSINESS_ACCOUNT_OBJECT {
        log::debug!("webhook: ignoring payload for object {:?}", payload.object);
        return Vec::new();
    }
    payload
        .entry
        .iter()
        .flat_map(|entry| entry.changes.iter())
        .filter(|change| change.field == MESSAGES_FIELD)
        .flat_map(|change| change.value.messages.iter())
        .filter_map(to_message)
        .collect()
}

fn to_message(msg: &WebhookMessage) -> Option<Message> {
    if msg.message_type != TEXT_TYPE {
        log::debug!("webhook: skipping {} message {}", msg.message_type, msg.id);
        return None;
    }
    let text = msg.text.as_ref().map(|t| t.body.as_str()).unwrap_or("");
    if text.is_empty() || msg.from.is_empty() {
        log::debug!("webhook: skipping text message {} without body or sender", msg.id);
        return None;
    }
    Some(Message {
        id: msg.id.clone(),
        sender_id: msg.from.clone(),
        text: text.to_string(),
        timestamp: parse_timestamp(&msg.timestamp),
    })
}

/// Unix seconds string -> UTC time; anything unparsable becomes "now".
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}
