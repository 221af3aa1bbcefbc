//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::web::state::AppState;

/// Cookies that may carry the identity provider's session token, in lookup order.
pub const SESSION_COOKIES: [&str; 3] = [
    "session",
    "next-auth.session-token",
    "__Secure-next-auth.session-token",
];

/// Middleware that resolves the session cookie into the signed-in identity.
///
/// If valid, inserts the `Identity` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (cookie, token) = session_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let identity = state.identity.resolve(cookie, &token).await.map_err(|e| {
        warn!("Failed to resolve session: {}", e);
        StatusCode::UNAUTHORIZED
    })?;
    debug!(user_id = %identity.user_id, "Request authenticated");

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Cookie name the backend expects for a token found under `name`.
fn forwarded_cookie(name: &'static str) -> &'static str {
    match name {
        "session" => "next-auth.session-token",
        other => other,
    }
}

/// Finds the first known session cookie in the request's `Cookie` headers.
///
/// Returns the cookie name to forward upstream together with the token.
pub fn session_token(headers: &HeaderMap) -> Option<(&'static str, String)> {
    let pairs: Vec<(&str, &str)> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|c| c.trim().split_once('='))
        .collect();

    SESSION_COOKIES.iter().find_map(|name| {
        pairs
            .iter()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| (forwarded_cookie(*name), value.to_string()))
    })
}
