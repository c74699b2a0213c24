//! Normalized inbound message: what the relay pipeline needs from a webhook entry.

use chrono::{DateTime, Utc};

/// One text message from a sender, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    /// Platform-assigned sender id (WhatsApp `wa_id`), also the reply recipient.
    pub sender_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
