use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use webbrief_core::BearerGate;

/// Token from an `Authorization: Bearer <token>` header value. The scheme is case-insensitive.
pub(crate) fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let s = value.to_str().ok()?;
    let (scheme, token) = s.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        "unauthorized",
    )
        .into_response()
}

/// Rejects every request that does not carry the configured bearer secret. On success the
/// `AccessGrant` is attached to the request extensions.
pub(crate) async fn require_bearer(
    State(gate): State<Arc<BearerGate>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(bearer_token)
    else {
        tracing::warn!(path = %req.uri().path(), "rejected request without bearer token");
        return unauthorized();
    };
    match gate.authenticate(token) {
        Ok(grant) => {
            req.extensions_mut().insert(grant);
            next.run(req).await
        }
        Err(_) => {
            tracing::warn!(path = %req.uri().path(), "rejected request with invalid bearer token");
            unauthorized()
        }
    }
}
