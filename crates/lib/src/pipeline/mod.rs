//! Relay pipeline: normalized messages in, one reply per message out.

mod dispatcher;
mod reply;

pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use reply::{reply_text, ReplyOutcome, ReplySender, NO_OUTPUT_FALLBACK, UNAVAILABLE_FALLBACK};
