use crate::config::AppConfig;
use rmcp::{
    handler::server::router::tool::ToolRouter as RmcpToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::{
        streamable_http_server::session::local::LocalSessionManager, StreamableHttpServerConfig,
        StreamableHttpService,
    },
    ErrorData as McpError,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use webbrief_core::{
    BearerGate, Error as WebbriefError, FetchBackend, FetchRequest, SearchProvider, SearchQuery,
    ToolDescription,
};
use webbrief_local::extract;
use webbrief_local::research;
use webbrief_local::search::SerperSearchProvider;
use webbrief_local::LocalFetcher;

pub(crate) mod auth;
mod envelope;
use envelope::*;

pub const SERVER_NAME: &str = "Web Research Assistant MCP";
pub const SERVER_DESCRIPTION: &str = "A powerful web research assistant that can search the internet and scrape webpage content to answer user questions with up-to-date information.";

pub const RESEARCH_DESCRIPTION: ToolDescription = ToolDescription {
    description: "Performs a web search for a query and provides a detailed summary paragraph, followed by a list of source websites.",
    use_when: "When the user asks a question that requires up-to-date information. This is the first step.",
};

pub const SCRAPE_DESCRIPTION: ToolDescription = ToolDescription {
    description: "Extracts all the clean text content from a specific webpage URL. Use this after finding sources with the research tool.",
    use_when: "When the user wants the full content of a specific link that was found via web research.",
};

const SCRAPE_OK_MESSAGE: &str = "Here is the extracted text for summarization:";
const SCRAPE_EMPTY_MESSAGE: &str = "Visited page but found no main text content.";

#[derive(Debug, Deserialize, JsonSchema, Default)]
struct WebResearchArgs {
    /// The user's question or topic to search for.
    #[serde(default)]
    query: Option<String>,
    /// Number of results to request from the provider (default: 5, max: 20).
    #[serde(default)]
    num_results: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
struct ScrapeArgs {
    /// The URL of the webpage to read.
    #[serde(default)]
    url: Option<String>,
}

#[derive(Clone)]
pub(crate) struct WebbriefMcp {
    tool_router: RmcpToolRouter<Self>,
    config: Arc<AppConfig>,
    fetcher: Arc<LocalFetcher>,
    http: reqwest::Client,
}

#[tool_router]
impl WebbriefMcp {
    pub(crate) fn new(config: Arc<AppConfig>) -> Result<Self, McpError> {
        let fetcher =
            LocalFetcher::new().map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(Self {
            tool_router: Self::tool_router(),
            config,
            fetcher: Arc::new(fetcher),
            http: reqwest::Client::builder()
                .user_agent(concat!("webbrief/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| McpError::internal_error(e.to_string(), None))?,
        })
    }

    #[tool(description = "Provides metadata about this MCP server.")]
    async fn about(&self) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = "about", "tool call");
        let tools: Vec<serde_json::Value> = [
            ("perform_web_research", RESEARCH_DESCRIPTION),
            ("scrape_webpage_content", SCRAPE_DESCRIPTION),
        ]
        .into_iter()
        .map(|(name, d)| {
            let mut v = d.to_json();
            v["name"] = serde_json::json!(name);
            v
        })
        .collect();
        Ok(tool_result(serde_json::json!({
            "name": SERVER_NAME,
            "description": SERVER_DESCRIPTION,
            "tools": tools,
        })))
    }

    #[tool(description = "Returns the configured validation identifier for platform ownership checks.")]
    async fn validate(&self) -> Result<CallToolResult, McpError> {
        tracing::debug!(tool = "validate", "tool call");
        Ok(CallToolResult::success(vec![Content::text(
            self.config.validation_id_or_fallback(),
        )]))
    }

    #[tool(
        description = "Performs a web search for a query and provides a detailed summary paragraph, followed by a list of source websites. Use when the user asks a question that requires up-to-date information. This is the first step."
    )]
    async fn perform_web_research(
        &self,
        params: Parameters<Option<WebResearchArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "perform_web_research";
        let t0 = std::time::Instant::now();
        let args = params.0.unwrap_or_default();
        let query = args.query.unwrap_or_default().trim().to_string();
        tracing::debug!(tool = kind, query = %query, "tool call");

        if query.is_empty() {
            return Ok(tool_result(failure(
                kind,
                ErrorCode::InvalidParams,
                "Error: query must not be empty.".to_string(),
                t0.elapsed().as_millis(),
            )));
        }

        let provider = match SerperSearchProvider::new(
            self.http.clone(),
            self.config.serper_api_key.as_deref(),
            self.config.serper_endpoint.as_deref(),
        ) {
            Ok(p) => p,
            Err(_) => {
                return Ok(tool_result(failure(
                    kind,
                    ErrorCode::NotConfigured,
                    "Error: SERPER_API_KEY is not set.".to_string(),
                    t0.elapsed().as_millis(),
                )));
            }
        };

        let q = SearchQuery {
            query: query.clone(),
            max_results: Some(args.num_results.unwrap_or(5)),
            timeout_ms: Some(self.config.search_timeout.as_millis() as u64),
        };
        let resp = match provider.search(&q).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(tool = kind, error = %e, "search provider failed");
                let message = match &e {
                    WebbriefError::HttpStatus { status, body } => {
                        format!("Error: search provider returned HTTP {status}: {body}")
                    }
                    WebbriefError::Search(detail) => {
                        format!("An unexpected error occurred during web search: {detail}")
                    }
                    other => format!("An unexpected error occurred during web search: {other}"),
                };
                return Ok(tool_result(failure(
                    kind,
                    ErrorCode::SearchFailed,
                    message,
                    t0.elapsed().as_millis(),
                )));
            }
        };

        let mut payload = if resp.results.is_empty() {
            serde_json::json!({
                "ok": true,
                "message": research::no_results_message(&query),
                "results_data": [],
            })
        } else {
            serde_json::json!({
                "ok": true,
                "message": research::compose_summary(&query, &resp.results),
                "results_data": resp.results,
                "provider": resp.provider,
            })
        };
        add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
        Ok(tool_result(payload))
    }

    #[tool(
        description = "Extracts all the clean text content from a specific webpage URL. Use this after finding sources with the research tool. Use when the user wants the full content of a specific link that was found via web research."
    )]
    async fn scrape_webpage_content(
        &self,
        params: Parameters<Option<ScrapeArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "scrape_webpage_content";
        let t0 = std::time::Instant::now();
        let url = params.0.unwrap_or_default().url.unwrap_or_default();
        let url = url.trim().to_string();
        tracing::debug!(tool = kind, url = %url, "tool call");

        if url.is_empty() {
            return Ok(tool_result(failure(
                kind,
                ErrorCode::InvalidParams,
                "Error: url must not be empty.".to_string(),
                t0.elapsed().as_millis(),
            )));
        }

        let req = FetchRequest {
            timeout_ms: Some(self.config.scrape_timeout.as_millis() as u64),
            max_bytes: Some(self.config.scrape_max_bytes),
            ..FetchRequest::new(url.clone())
        };
        let fetched = match self.fetcher.fetch(&req).await {
            Ok(r) if r.is_success() => r,
            Ok(r) => {
                let e = WebbriefError::HttpStatus {
                    status: r.status,
                    body: String::new(),
                };
                return Ok(tool_result(fetch_failure(kind, &url, &e, t0)));
            }
            Err(e) => return Ok(tool_result(fetch_failure(kind, &url, &e, t0))),
        };

        let mut payload = match extract::scrape_text(
            &fetched.bytes,
            fetched.content_type.as_deref(),
            self.config.scrape_max_chars,
        ) {
            Ok(Some(scraped)) => serde_json::json!({
                "ok": true,
                "message": SCRAPE_OK_MESSAGE,
                "full_text": scraped.text,
                "truncated": scraped.truncated,
                "final_url": fetched.final_url,
            }),
            Ok(None) => serde_json::json!({
                "ok": true,
                "message": SCRAPE_EMPTY_MESSAGE,
                "final_url": fetched.final_url,
            }),
            Err(WebbriefError::UnsupportedContentType(ct)) => {
                return Ok(tool_result(failure(
                    kind,
                    ErrorCode::UnsupportedContent,
                    format!("Error: URL points to '{ct}', not a webpage."),
                    t0.elapsed().as_millis(),
                )));
            }
            Err(e) => {
                return Ok(tool_result(failure(
                    kind,
                    ErrorCode::UnexpectedError,
                    format!("Error: unexpected failure while reading '{url}': {e}"),
                    t0.elapsed().as_millis(),
                )));
            }
        };
        add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
        Ok(tool_result(payload))
    }
}

fn fetch_failure(
    kind: &str,
    url: &str,
    e: &WebbriefError,
    t0: std::time::Instant,
) -> serde_json::Value {
    tracing::warn!(tool = kind, url = %url, error = %e, "fetch failed");
    let detail = match e {
        WebbriefError::HttpStatus { status, .. } => format!("HTTP {status}"),
        other => other.to_string(),
    };
    failure(
        kind,
        code_for(e),
        format!("Error: unable to read the content from '{url}': {detail}"),
        t0.elapsed().as_millis(),
    )
}

#[tool_handler]
impl rmcp::ServerHandler for WebbriefMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Web research assistant: search the web with perform_web_research, then read a source with scrape_webpage_content. Outputs are JSON with a human-readable `message`."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Build the HTTP app: MCP streamable HTTP at `/mcp`, gated by the bearer secret.
pub fn router(config: Arc<AppConfig>) -> anyhow::Result<axum::Router> {
    let gate = Arc::new(BearerGate::new(config.auth_token.clone())?);
    // Fail fast on client construction problems instead of on the first request.
    WebbriefMcp::new(config.clone()).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let stateful_mode = !config.stateless;
    let service = StreamableHttpService::new(
        move || WebbriefMcp::new(config.clone()).map_err(|e| std::io::Error::other(e.to_string())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            stateful_mode,
            ..Default::default()
        },
    );

    Ok(axum::Router::new()
        .nest_service("/mcp", service)
        .layer(axum::middleware::from_fn_with_state(
            gate,
            auth::require_bearer,
        )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, http::StatusCode, routing::get, routing::post, Json, Router};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn p<T>(v: T) -> Parameters<Option<T>> {
        Parameters(Some(v))
    }

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn config() -> AppConfig {
        AppConfig::new("test-token", "127.0.0.1:0".parse().unwrap())
    }

    fn svc(cfg: AppConfig) -> WebbriefMcp {
        WebbriefMcp::new(Arc::new(cfg)).expect("new")
    }

    fn payload(r: &CallToolResult) -> serde_json::Value {
        if let Some(v) = r.structured_content.clone() {
            return v;
        }
        let s = r
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default();
        serde_json::from_str(&s).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Search fixture returning `body` and counting hits.
    async fn search_fixture(body: serde_json::Value) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let app = Router::new().route(
            "/search",
            post(move || {
                let h = h.clone();
                let body = body.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                    Json(body)
                }
            }),
        );
        let addr = serve(app).await;
        (format!("http://{addr}/search"), hits)
    }

    fn research(query: &str) -> Parameters<Option<WebResearchArgs>> {
        p(WebResearchArgs {
            query: Some(query.to_string()),
            num_results: None,
        })
    }

    fn scrape(url: String) -> Parameters<Option<ScrapeArgs>> {
        p(ScrapeArgs { url: Some(url) })
    }

    #[test]
    fn tool_router_exposes_the_four_tools() {
        let s = svc(config());
        let mut names: Vec<String> = s
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "about",
                "perform_web_research",
                "scrape_webpage_content",
                "validate"
            ]
        );
    }

    #[test]
    fn tool_descriptions_match_static_metadata() {
        let s = svc(config());
        let mut checked = 0;
        for t in s.tool_router.list_all() {
            let d = t.description.as_deref().unwrap_or("").to_string();
            let meta = match t.name.as_ref() {
                "perform_web_research" => RESEARCH_DESCRIPTION,
                "scrape_webpage_content" => SCRAPE_DESCRIPTION,
                _ => continue,
            };
            assert!(d.starts_with(meta.description), "{}: {d}", t.name);
            // `use_when` starts with "When the user ..."; the listing says "Use when the user ...".
            let when = meta.use_when.trim_start_matches("When ");
            assert!(d.contains(when.trim_end_matches('.')), "{}: {d}", t.name);
            checked += 1;
        }
        assert_eq!(checked, 2);
    }

    #[tokio::test]
    async fn blank_query_is_rejected_without_outbound_request() {
        let (endpoint, hits) = search_fixture(serde_json::json!({"organic": []})).await;
        let mut cfg = config();
        cfg.serper_api_key = Some("k".to_string());
        cfg.serper_endpoint = Some(endpoint);

        for q in ["", "   \t\n"] {
            let r = svc(cfg.clone())
                .perform_web_research(research(q))
                .await
                .unwrap();
            let v = payload(&r);
            assert_eq!(v["ok"], false);
            assert_eq!(v["message"], "Error: query must not be empty.");
            assert_eq!(v["error"]["code"], "invalid_params");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_api_key_is_reported_without_outbound_request() {
        let (endpoint, hits) = search_fixture(serde_json::json!({"organic": []})).await;
        let mut cfg = config();
        cfg.serper_endpoint = Some(endpoint);

        let r = svc(cfg)
            .perform_web_research(research("rust"))
            .await
            .unwrap();
        let v = payload(&r);
        assert_eq!(v["message"], "Error: SERPER_API_KEY is not set.");
        assert_eq!(v["error"]["code"], "not_configured");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn research_summarizes_organic_results_in_order() {
        let (endpoint, hits) = search_fixture(serde_json::json!({
            "organic": [
                {"title": "A", "link": "https://www.foo.com/x", "snippet": "S1"},
                {"title": "B", "link": "https://bar.org/y", "snippet": "S2"}
            ]
        }))
        .await;
        let mut cfg = config();
        cfg.serper_api_key = Some("k".to_string());
        cfg.serper_endpoint = Some(endpoint);

        let r = svc(cfg)
            .perform_web_research(research("  what is rust  "))
            .await
            .unwrap();
        let v = payload(&r);
        assert_eq!(v["ok"], true);
        let msg = v["message"].as_str().unwrap();
        assert!(msg.contains("**'what is rust'**"));
        assert!(msg.contains("\n\nS1\n\n"));
        let a = msg.find("- **A** (found on Foo)").unwrap();
        let b = msg.find("- **B** (found on Bar)").unwrap();
        assert!(a < b);

        let data = v["results_data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["title"], "A");
        assert_eq!(data[0]["link"], "https://www.foo.com/x");
        assert_eq!(data[1]["snippet"], "S2");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_organic_reports_no_results() {
        let (endpoint, _hits) = search_fixture(serde_json::json!({"organic": []})).await;
        let mut cfg = config();
        cfg.serper_api_key = Some("k".to_string());
        cfg.serper_endpoint = Some(endpoint);

        let r = svc(cfg).perform_web_research(research("q")).await.unwrap();
        let v = payload(&r);
        assert_eq!(v["message"], "No results found for 'q'.");
        assert_eq!(v["results_data"].as_array().map(|a| a.len()), Some(0));
    }

    #[tokio::test]
    async fn provider_http_error_is_a_message_not_a_failure() {
        let app = Router::new().route(
            "/search",
            post(|| async { (StatusCode::UNAUTHORIZED, "Unauthorized.") }),
        );
        let addr = serve(app).await;
        let mut cfg = config();
        cfg.serper_api_key = Some("bad".to_string());
        cfg.serper_endpoint = Some(format!("http://{addr}/search"));

        let r = svc(cfg).perform_web_research(research("q")).await.unwrap();
        let v = payload(&r);
        assert_eq!(v["ok"], false);
        assert_eq!(
            v["message"],
            "Error: search provider returned HTTP 401: Unauthorized."
        );
        assert_eq!(v["error"]["code"], "search_failed");
        assert_eq!(v["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn unreachable_provider_is_an_unexpected_error_message() {
        let mut cfg = config();
        cfg.serper_api_key = Some("k".to_string());
        // Port 9 (discard) on loopback: connection refused in practice.
        cfg.serper_endpoint = Some("http://127.0.0.1:9/search".to_string());

        let r = svc(cfg).perform_web_research(research("q")).await.unwrap();
        let v = payload(&r);
        let msg = v["message"].as_str().unwrap();
        assert!(msg.starts_with("An unexpected error occurred during web search:"));
        assert!(!msg.contains("search failed:"), "message: {msg}");
    }

    fn page_app() -> Router {
        Router::new()
            .route(
                "/article",
                get(|| async {
                    (
                        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                        "<html><body><script>x</script><p>Hello</p><p>World</p></body></html>",
                    )
                }),
            )
            .route(
                "/empty",
                get(|| async {
                    (
                        [(header::CONTENT_TYPE, "text/html")],
                        "<html><body><div>no paragraphs</div></body></html>",
                    )
                }),
            )
            .route(
                "/long",
                get(|| async {
                    (
                        [(header::CONTENT_TYPE, "text/html")],
                        format!("<p>{}</p>", "word ".repeat(3_000)),
                    )
                }),
            )
            .route(
                "/doc.pdf",
                get(|| async { ([(header::CONTENT_TYPE, "application/pdf")], "%PDF-1.7") }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
    }

    #[tokio::test]
    async fn scrape_extracts_paragraph_text() {
        let addr = serve(page_app()).await;
        let r = svc(config())
            .scrape_webpage_content(scrape(format!("http://{addr}/article")))
            .await
            .unwrap();
        let v = payload(&r);
        assert_eq!(v["ok"], true);
        assert_eq!(v["message"], SCRAPE_OK_MESSAGE);
        assert_eq!(v["full_text"], "Hello World");
        assert_eq!(v["truncated"], false);
    }

    #[tokio::test]
    async fn scrape_without_paragraphs_reports_no_main_text() {
        let addr = serve(page_app()).await;
        let r = svc(config())
            .scrape_webpage_content(scrape(format!("http://{addr}/empty")))
            .await
            .unwrap();
        let v = payload(&r);
        assert_eq!(v["message"], SCRAPE_EMPTY_MESSAGE);
        assert!(v.get("full_text").is_none());
    }

    #[tokio::test]
    async fn scrape_caps_long_pages() {
        let addr = serve(page_app()).await;
        let r = svc(config())
            .scrape_webpage_content(scrape(format!("http://{addr}/long")))
            .await
            .unwrap();
        let v = payload(&r);
        let text = v["full_text"].as_str().unwrap();
        assert_eq!(text.chars().count(), 5_000);
        assert!("word ".repeat(3_000).starts_with(text));
        assert_eq!(v["truncated"], true);
    }

    #[tokio::test]
    async fn scrape_rejects_non_webpage_content_types() {
        let addr = serve(page_app()).await;
        let r = svc(config())
            .scrape_webpage_content(scrape(format!("http://{addr}/doc.pdf")))
            .await
            .unwrap();
        let v = payload(&r);
        assert_eq!(
            v["message"],
            "Error: URL points to 'application/pdf', not a webpage."
        );
        assert_eq!(v["error"]["code"], "unsupported_content");
    }

    #[tokio::test]
    async fn scrape_reports_http_errors_as_messages() {
        let addr = serve(page_app()).await;
        let url = format!("http://{addr}/missing");
        let r = svc(config())
            .scrape_webpage_content(scrape(url.clone()))
            .await
            .unwrap();
        let v = payload(&r);
        assert_eq!(
            v["message"],
            format!("Error: unable to read the content from '{url}': HTTP 404")
        );
        assert_eq!(v["error"]["code"], "fetch_failed");
    }

    #[tokio::test]
    async fn scrape_requires_a_url() {
        let r = svc(config())
            .scrape_webpage_content(p(ScrapeArgs::default()))
            .await
            .unwrap();
        let v = payload(&r);
        assert_eq!(v["message"], "Error: url must not be empty.");
    }

    #[tokio::test]
    async fn scrape_reports_invalid_urls_as_messages() {
        let r = svc(config())
            .scrape_webpage_content(scrape("not a url".to_string()))
            .await
            .unwrap();
        let v = payload(&r);
        assert!(v["message"]
            .as_str()
            .unwrap()
            .starts_with("Error: unable to read the content from 'not a url':"));
        assert_eq!(v["error"]["code"], "invalid_params");
    }

    fn text_of(r: &CallToolResult) -> String {
        r.content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn validate_returns_configured_id_or_fallback() {
        let r = svc(config()).validate().await.unwrap();
        assert_eq!(text_of(&r), crate::config::VALIDATION_FALLBACK);

        let mut cfg = config();
        cfg.validation_id = Some("919876543210".to_string());
        let r = svc(cfg).validate().await.unwrap();
        assert_eq!(text_of(&r), "919876543210");
    }

    #[tokio::test]
    async fn about_reports_static_identity() {
        let r = svc(config()).about().await.unwrap();
        let v = payload(&r);
        assert_eq!(v["name"], SERVER_NAME);
        assert_eq!(v["description"], SERVER_DESCRIPTION);
        assert_eq!(v["tools"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(v["tools"][0]["use_when"], RESEARCH_DESCRIPTION.use_when);
    }
}
