//! Process configuration, read once at startup and shared read-only afterwards.

use std::net::SocketAddr;
use std::time::Duration;
use webbrief_core::{Error, Result};

/// Placeholders that shipped in sample `.env` files; treat them as unset.
const SERPER_KEY_PLACEHOLDER: &str = "YOUR_SERPER_API_KEY_HERE";
const VALIDATION_ID_PLACEHOLDER: &str = "YOUR_MOBILE_NUMBER_HERE";

pub const VALIDATION_FALLBACK: &str = "not configured";

/// First non-blank value among `keys`, in order.
pub(crate) fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        std::env::var(k)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

pub(crate) fn auth_token_from_env() -> Option<String> {
    env_first(&["WEBBRIEF_AUTH_TOKEN", "TOKEN"])
}

pub(crate) fn validation_id_from_env() -> Option<String> {
    env_first(&["WEBBRIEF_VALIDATION_ID", "MY_NUMBER"]).filter(|v| v != VALIDATION_ID_PLACEHOLDER)
}

pub(crate) fn serper_api_key_from_env() -> Option<String> {
    env_first(&["WEBBRIEF_SERPER_API_KEY", "SERPER_API_KEY"])
        .filter(|v| !v.contains(SERPER_KEY_PLACEHOLDER))
}

pub(crate) fn serper_endpoint_from_env() -> Option<String> {
    env_first(&["WEBBRIEF_SERPER_ENDPOINT"])
}

#[derive(Clone)]
pub struct AppConfig {
    pub auth_token: String,
    pub validation_id: Option<String>,
    pub serper_api_key: Option<String>,
    pub serper_endpoint: Option<String>,
    pub listen: SocketAddr,
    pub search_timeout: Duration,
    pub scrape_timeout: Duration,
    pub scrape_max_chars: usize,
    pub scrape_max_bytes: u64,
    /// Serve MCP without per-client sessions (each POST is handled on its own).
    pub stateless: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Report presence only; never values of secrets.
        f.debug_struct("AppConfig")
            .field("auth_token", &"<redacted>")
            .field("validation_id", &self.validation_id.is_some())
            .field("serper_api_key", &self.serper_api_key.is_some())
            .field("serper_endpoint", &self.serper_endpoint)
            .field("listen", &self.listen)
            .field("search_timeout", &self.search_timeout)
            .field("scrape_timeout", &self.scrape_timeout)
            .field("scrape_max_chars", &self.scrape_max_chars)
            .field("scrape_max_bytes", &self.scrape_max_bytes)
            .field("stateless", &self.stateless)
            .finish()
    }
}

impl AppConfig {
    /// Defaults for everything except the secret.
    pub fn new(auth_token: impl Into<String>, listen: SocketAddr) -> Self {
        Self {
            auth_token: auth_token.into(),
            validation_id: None,
            serper_api_key: None,
            serper_endpoint: None,
            listen,
            search_timeout: Duration::from_secs(10),
            scrape_timeout: Duration::from_secs(15),
            scrape_max_chars: 5_000,
            scrape_max_bytes: 5_000_000,
            stateless: false,
        }
    }

    pub fn from_env(listen: SocketAddr) -> Result<Self> {
        let auth_token = auth_token_from_env().ok_or_else(|| {
            Error::NotConfigured("missing WEBBRIEF_AUTH_TOKEN (or TOKEN)".to_string())
        })?;
        Ok(Self {
            validation_id: validation_id_from_env(),
            serper_api_key: serper_api_key_from_env(),
            serper_endpoint: serper_endpoint_from_env(),
            ..Self::new(auth_token, listen)
        })
    }

    pub fn validation_id_or_fallback(&self) -> &str {
        self.validation_id.as_deref().unwrap_or(VALIDATION_FALLBACK)
    }
}
