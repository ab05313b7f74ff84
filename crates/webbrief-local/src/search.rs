use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use webbrief_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};

pub const SERPER_DEFAULT_ENDPOINT: &str = "https://google.serper.dev/search";

/// Upstream error bodies can be whole HTML pages; keep what we embed in messages short.
const MAX_ERROR_BODY_CHARS: usize = 500;

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    q.timeout_ms.unwrap_or(10_000).clamp(1_000, 60_000)
}

#[derive(Debug, Clone)]
pub struct SerperSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerperSearchProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::NotConfigured("SERPER_API_KEY".to_string()))?;
        let endpoint = endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(SERPER_DEFAULT_ENDPOINT);
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SerperSearchResponse {
    #[serde(default)]
    organic: Option<Vec<SerperOrganic>>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerperSearchProvider {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let num = q.max_results.unwrap_or(5).clamp(1, 20);
        let timeout_ms = timeout_ms_from_query(q);

        let body = serde_json::json!({
            "q": q.query,
            "num": num,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SerperSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let results = parsed
            .organic
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                link: r.link,
                snippet: r.snippet,
            })
            .collect();

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());

        Ok(SearchResponse {
            results,
            provider: "serper".to_string(),
            timings_ms,
        })
    }
}
