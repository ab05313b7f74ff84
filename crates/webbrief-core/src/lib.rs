use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("unauthorized")]
    Unauthorized,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Static metadata attached to a tool.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ToolDescription {
    pub description: &'static str,
    pub use_when: &'static str,
}

impl ToolDescription {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "description": self.description,
            "use_when": self.use_when,
        })
    }
}

// ---- auth ----

/// Per-request access grant. There are no scopes and no expiry: the gate is a single shared
/// secret, so a grant only records that the presented token matched.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccessGrant {
    pub token_matched: bool,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<u64>,
}

/// Validates bearer tokens against one secret fixed at construction.
#[derive(Clone)]
pub struct BearerGate {
    secret: Vec<u8>,
}

impl std::fmt::Debug for BearerGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        f.debug_struct("BearerGate").finish_non_exhaustive()
    }
}

impl BearerGate {
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret: String = secret.into();
        if secret.trim().is_empty() {
            return Err(Error::NotConfigured("bearer secret is empty".to_string()));
        }
        Ok(Self {
            secret: secret.into_bytes(),
        })
    }

    pub fn authenticate(&self, token: &str) -> Result<AccessGrant> {
        if !constant_time_eq(token.as_bytes(), &self.secret) {
            return Err(Error::Unauthorized);
        }
        Ok(AccessGrant {
            token_matched: true,
            client_id: "unknown".to_string(),
            scopes: Vec::new(),
            expires_at: None,
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ---- fetch ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the whole request (connect + body).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: None,
            max_bytes: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn parsed_url(&self) -> Result<url::Url> {
        let url = url::Url::parse(self.url.trim()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::InvalidUrl(format!("unsupported scheme: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
    pub timings_ms: BTreeMap<String, u128>,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

/// Visible paragraph text extracted from a fetched page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeResult {
    pub text: String,
    pub truncated: bool,
}

// ---- search ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub timeout_ms: Option<u64>,
}

/// One organic result, in provider order. Every field may be missing upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub title: Option<String>,
    pub link: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}
