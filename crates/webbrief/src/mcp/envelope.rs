use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

pub(crate) const SCHEMA_VERSION: u64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidParams,
    NotConfigured,
    SearchFailed,
    FetchFailed,
    UnsupportedContent,
    UnexpectedError,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::NotConfigured => "not_configured",
            Self::SearchFailed => "search_failed",
            Self::FetchFailed => "fetch_failed",
            Self::UnsupportedContent => "unsupported_content",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::SearchFailed | Self::FetchFailed => true,
            // Configuration + invalid input are not retryable without changing something.
            Self::InvalidParams
            | Self::NotConfigured
            | Self::UnsupportedContent
            | Self::UnexpectedError => false,
        }
    }
}

/// Map a library error onto the envelope code it should surface as.
pub(crate) fn code_for(e: &webbrief_core::Error) -> ErrorCode {
    use webbrief_core::Error as E;
    match e {
        E::InvalidParams(_) | E::InvalidUrl(_) => ErrorCode::InvalidParams,
        E::NotConfigured(_) => ErrorCode::NotConfigured,
        E::Search(_) => ErrorCode::SearchFailed,
        E::Fetch(_) | E::HttpStatus { .. } => ErrorCode::FetchFailed,
        E::UnsupportedContentType(_) => ErrorCode::UnsupportedContent,
        E::Unauthorized => ErrorCode::UnexpectedError,
    }
}

pub(crate) fn error_obj(code: ErrorCode, message: impl ToString) -> serde_json::Value {
    #[derive(Serialize)]
    struct ErrorObject {
        code: &'static str,
        message: String,
        retryable: bool,
    }

    let e = ErrorObject {
        code: code.as_str(),
        message: message.to_string(),
        retryable: code.retryable(),
    };
    serde_json::to_value(e).unwrap_or_else(|_| {
        serde_json::json!({
            "code": code.as_str(),
            "message": message.to_string(),
            "retryable": code.retryable()
        })
    })
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
}

/// Failure payload. `message` is what agents read; `error` is for machine consumers.
pub(crate) fn failure(kind: &str, code: ErrorCode, message: String, elapsed_ms: u128) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "ok": false,
        "message": message,
        "error": error_obj(code, &message),
    });
    add_envelope_fields(&mut payload, kind, elapsed_ms);
    payload
}

pub(crate) fn tool_result(payload: serde_json::Value) -> CallToolResult {
    // Structured content for machine consumers, plus a text fallback for clients that only
    // read `content[0].text`.
    let mut r = CallToolResult::structured(payload.clone());
    r.content = vec![Content::text(payload.to_string())];
    r
}
