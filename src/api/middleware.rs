//! Request middleware: identity resolution, body limits, security headers.
//!
//! Identity resolution never rejects a request by itself — it attaches the
//! resolved caller (or nothing) to the request, and each handler decides
//! through the authorization gate whether that is enough. This keeps the
//! 401-vs-403 split in exactly one place.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::auth::{AuthContext, AuthorizationGate};

/// Shared state for the identity and body-size middleware.
#[derive(Clone)]
pub struct RequestGuardState {
    pub gate: Arc<AuthorizationGate>,
    pub enable_auth: bool,
    pub max_request_size: usize,
}

/// Caller identity resolved for this request, if any.
#[derive(Debug, Clone, Default)]
pub struct MaybeAuth(pub Option<AuthContext>);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller's bearer token into an [`AuthContext`] extension.
pub async fn identity_middleware(
    State(state): State<RequestGuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = if state.enable_auth {
        match bearer_token(request.headers()) {
            Some(token) => match state.gate.resolve(token).await {
                Ok(ctx) => ctx,
                Err(e) => {
                    warn!(error = %e, "Identity resolution failed");
                    None
                }
            },
            None => None,
        }
    } else {
        None
    };

    request.extensions_mut().insert(MaybeAuth(resolved));
    next.run(request).await
}

/// Reject oversized request bodies before reading them.
pub async fn body_size_middleware(
    State(state): State<RequestGuardState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(length) = request
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if length > state.max_request_size {
            warn!(
                length,
                max = state.max_request_size,
                "Request body too large"
            );
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
    }

    Ok(next.run(request).await)
}

/// Standard security headers on every response.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.remove("Server");

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok_123"));
        assert_eq!(bearer_token(&headers), Some("tok_123"));
    }

    #[test]
    fn test_bearer_token_missing_or_malformed() {
        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
