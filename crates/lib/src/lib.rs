//! Relay core library: the gateway reverse proxy, the WhatsApp webhook pipeline, and the
//! generation service, shared by the `relay` binary.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod relay;
