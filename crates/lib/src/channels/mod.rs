//! Messaging channel (WhatsApp Cloud API).
//!
//! Inbound webhooks are decoded into wire types and normalized into flat [`Message`]s;
//! replies go out through a [`ChannelHandle`].

mod handle;
mod inbound;
mod normalize;
mod whatsapp;

pub use handle::{ChannelError, ChannelHandle};
pub use inbound::Message;
pub use normalize::{normalize, BUSINESS_ACCOUNT_OBJECT};
pub use whatsapp::{
    WebhookChange, WebhookEntry, WebhookMessage, WebhookPayload, WebhookText, WebhookValue,
    WhatsAppClient,
};
