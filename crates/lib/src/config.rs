//! Configuration types and loading.
//!
//! Config is loaded from an optional JSON file (e.g. `~/.relay/config.json`) and then
//! overridden by environment variables. Built once at startup and handed to each service.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Listen address for whichever service is being run.
    #[serde(default)]
    pub server: ServerConfig,

    /// Base URLs of the internal services (used by the gateway and the relay).
    #[serde(default)]
    pub services: ServicesConfig,

    /// WhatsApp Cloud API settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Generation backend settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Relay worker pool sizing.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Per-call network timeouts.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Reverse proxy limits.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for HTTP (default 8080).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    8080
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind.trim(), self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesConfig {
    /// Messaging (webhook) service base URL. Overridden by WHATSAPP_SERVICE_URL.
    #[serde(default = "default_messaging_url")]
    pub messaging_url: String,

    /// Generation service base URL. Overridden by LLM_SERVICE_URL.
    #[serde(default = "default_generation_url")]
    pub generation_url: String,
}

fn default_messaging_url() -> String {
    "http://whatsapp-service:8081".to_string()
}

fn default_generation_url() -> String {
    "http://llm-service:8082".to_string()
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            messaging_url: default_messaging_url(),
            generation_url: default_generation_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    /// Graph API base (default "https://graph.facebook.com/v17.0").
    #[serde(default = "default_whatsapp_api_url")]
    pub api_url: String,

    /// Bearer token for the send API. Empty until supplied.
    #[serde(default)]
    pub token: String,

    /// Sender phone number id used in the send URL.
    #[serde(default)]
    pub phone_id: String,

    /// Token expected in `hub.verify_token`. Falls back to `token` when unset.
    #[serde(default)]
    pub verify_token: Option<String>,
}

fn default_whatsapp_api_url() -> String {
    "https://graph.facebook.com/v17.0".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_url: default_whatsapp_api_url(),
            token: String::new(),
            phone_id: String::new(),
            verify_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRouterConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
}

fn default_model() -> String {
    "meta-llama/llama-3-70b-instruct".to_string()
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_openrouter_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Maximum messages processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Messages that may wait for a worker before webhooks are refused.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long shutdown waits for in-flight messages.
    #[serde(default = "default_drain_secs")]
    pub drain_secs: u64,
}

fn default_workers() -> usize {
    16
}

fn default_queue_capacity() -> usize {
    256
}

fn default_drain_secs() -> u64 {
    30
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            drain_secs: default_drain_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsConfig {
    /// Inbound request deadline for the gateway and messaging service.
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,

    #[serde(default = "default_proxy_secs")]
    pub proxy_secs: u64,

    #[serde(default = "default_generation_secs")]
    pub generation_secs: u64,

    #[serde(default = "default_send_secs")]
    pub send_secs: u64,
}

fn default_request_secs() -> u64 {
    60
}

fn default_proxy_secs() -> u64 {
    60
}

fn default_generation_secs() -> u64 {
    120
}

fn default_send_secs() -> u64 {
    30
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_secs: default_request_secs(),
            proxy_secs: default_proxy_secs(),
            generation_secs: default_generation_secs(),
            send_secs: default_send_secs(),
        }
    }
}

impl TimeoutsConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn proxy(&self) -> Duration {
        Duration::from_secs(self.proxy_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }

    pub fn send(&self) -> Duration {
        Duration::from_secs(self.send_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Largest request body the proxy will buffer (default 10 MiB).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Resolve the webhook verify token: explicit verify token, else the API token.
pub fn resolve_verify_token(config: &Config) -> &str {
    config
        .whatsapp
        .verify_token
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(config.whatsapp.token.as_str())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".relay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or RELAY_CONFIG_PATH / default), then apply environment
/// overrides. Missing file => defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_overrides(&mut config, env_value);
    Ok(config)
}

/// Trimmed, non-empty environment value.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: String) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {}: not a valid number: {}", key, value);
            None
        }
    }
}

/// Apply environment overrides using `lookup` (the process environment in production).
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(port) = lookup("PORT").and_then(|v| parse_or_warn("PORT", v)) {
        config.server.port = port;
    }
    if let Some(v) = lookup("BIND") {
        config.server.bind = v;
    }
    if let Some(v) = lookup("WHATSAPP_SERVICE_URL") {
        config.services.messaging_url = v;
    }
    if let Some(v) = lookup("LLM_SERVICE_URL") {
        config.services.generation_url = v;
    }
    if let Some(v) = lookup("WHATSAPP_API_URL") {
        config.whatsapp.api_url = v;
    }
    if let Some(v) = lookup("WHATSAPP_TOKEN") {
        config.whatsapp.token = v;
    }
    if let Some(v) = lookup("WHATSAPP_PHONE_ID") {
        config.whatsapp.phone_id = v;
    }
    if let Some(v) = lookup("WHATSAPP_VERIFY_TOKEN") {
        config.whatsapp.verify_token = Some(v);
    }
    if let Some(v) = lookup("OPENROUTER_API_KEY") {
        config.openrouter.api_key = v;
    }
    if let Some(v) = lookup("OPENROUTER_MODEL") {
        config.openrouter.model = v;
    }
    if let Some(v) = lookup("OPENROUTER_BASE_URL") {
        config.openrouter.base_url = v;
    }
    if let Some(n) = lookup("DISPATCH_WORKERS").and_then(|v| parse_or_warn("DISPATCH_WORKERS", v)) {
        config.dispatch.workers = n;
    }
    if let Some(n) = lookup("DISPATCH_QUEUE_CAPACITY")
        .and_then(|v| parse_or_warn("DISPATCH_QUEUE_CAPACITY", v))
    {
        config.dispatch.queue_capacity = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_deployment_layout() {
        let c = Config::default();
        assert_eq!(c.server.port, 8080);
        assert_eq!(c.services.messaging_url, "http://whatsapp-service:8081");
        assert_eq!(c.services.generation_url, "http://llm-service:8082");
        assert_eq!(c.whatsapp.api_url, "https://graph.facebook.com/v17.0");
        assert_eq!(c.openrouter.model, "meta-llama/llama-3-70b-instruct");
        assert!(c.whatsapp.token.is_empty());
        assert!(c.openrouter.api_key.is_empty());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut c = Config::default();
        apply_overrides(
            &mut c,
            lookup_from(&[
                ("PORT", "8081"),
                ("LLM_SERVICE_URL", "http://localhost:9000"),
                ("WHATSAPP_TOKEN", "secret"),
                ("DISPATCH_WORKERS", "4"),
            ]),
        );
        assert_eq!(c.server.port, 8081);
        assert_eq!(c.services.generation_url, "http://localhost:9000");
        assert_eq!(c.whatsapp.token, "secret");
        assert_eq!(c.dispatch.workers, 4);
    }

    #[test]
    fn invalid_port_is_ignored() {
        let mut c = Config::default();
        apply_overrides(&mut c, lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(c.server.port, 8080);
    }

    #[test]
    fn verify_token_falls_back_to_api_token() {
        let mut c = Config::default();
        c.whatsapp.token = "api".to_string();
        assert_eq!(resolve_verify_token(&c), "api");
        c.whatsapp.verify_token = Some("verify".to_string());
        assert_eq!(resolve_verify_token(&c), "verify");
        c.whatsapp.verify_token = Some("  ".to_string());
        assert_eq!(resolve_verify_token(&c), "api");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: Config =
            serde_json::from_str(r#"{"server":{"port":9090},"whatsapp":{"phoneId":"123"}}"#)
                .unwrap();
        assert_eq!(c.server.port, 9090);
        assert_eq!(c.server.bind, "0.0.0.0");
        assert_eq!(c.whatsapp.phone_id, "123");
        assert_eq!(c.dispatch.queue_capacity, 256);
    }
}
