//! Locating and resolving the session token a caller presents.
//!
//! A token may arrive as the session cookie, an `Authorization: Bearer`
//! header, or a `token` query parameter (for WebSocket clients that cannot
//! set headers). They are consulted in that order.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use relaychat_auth::Identity;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

/// Authenticate a request, failing with 401 when no valid token is presented.
pub fn authenticate(
    state: &GatewayState,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> GatewayResult<Identity> {
    let token = extract_token(headers, &state.cookie.name, query_token)
        .ok_or_else(|| GatewayError::AuthenticationFailed("missing token".to_string()))?;

    state.authenticator.resolve(&token).map_err(GatewayError::from)
}

pub fn extract_token(
    headers: &HeaderMap,
    cookie_name: &str,
    query_token: Option<&str>,
) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(cookie_name) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }

    query_token
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    parts
        .next()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
