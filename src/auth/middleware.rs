//! Request authentication middleware.

use axum::extract::{Query, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;

use crate::app_state::AppState;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Attaches a [`super::Principal`] extension when the request carries a
/// valid token.
///
/// The token is read from `Authorization: Bearer <jwt>` or, for browser
/// WebSocket clients that cannot set headers, from a `token` query
/// parameter. Requests without a valid token pass through untouched; each
/// handler decides whether a principal is required.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = bearer_token(req.headers()).or_else(|| {
        Query::<TokenQuery>::try_from_uri(req.uri())
            .ok()
            .and_then(|Query(q)| q.token)
    });

    if let Some(token) = token
        && let Ok(principal) = state.tokens.verify(&token)
    {
        req.extensions_mut().insert(principal);
    }

    next.run(req).await
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
