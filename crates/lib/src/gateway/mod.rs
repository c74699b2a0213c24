//! Gateway: public entry point that forwards routes to the internal services.
//!
//! Stateless pass-through; see [`proxy::forward`] for the forwarding contract.

mod proxy;
mod server;

pub use proxy::{forward, ProxyError};
pub use server::{router, run_gateway, GatewayState};
